//! Dense linear algebra primitives used by the decomposition solvers.
//!
//! Everything here works on plain `ndarray` matrices and vectors:
//! - shrinkage: `soft_threshold`, `shrink`
//! - norms: `norm`, `frobenius_norm`, `max_abs`, `spectral_norm`
//! - factorizations: `leading_singular_triplet` (power iteration),
//!   `jacobi_svd` (one-sided Jacobi) and `pseudo_inverse`

use crate::error::RoslError;
use crate::{Matrix, Vector};
use ndarray::{ArrayView1, Axis};
use std::cmp::Ordering;

const POWER_MAX_ITER: usize = 500;
const POWER_TOLERANCE: f64 = 1e-12;
const JACOBI_MAX_SWEEPS: usize = 60;
// Keeps 2^exponent and its reciprocal normal
const MAX_SCALE_EXPONENT: i32 = 1000;

/// Shrink `z` towards zero by `gamma`, clamping at zero.
pub fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

/// Element-wise soft-thresholding of a matrix.
pub fn shrink(x: &Matrix, gamma: f64) -> Matrix {
    x.mapv(|v| soft_threshold(v, gamma))
}

pub fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

pub fn frobenius_norm(x: &Matrix) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

pub fn max_abs(x: &Matrix) -> f64 {
    x.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
}

pub fn is_finite(x: &Matrix) -> bool {
    x.iter().all(|v| v.is_finite())
}

/// Power of two closest below `max_abs(x)`, or 1 for a zero matrix.
///
/// Dividing by it is exact, and it brings the largest magnitude into
/// [1, 2) so sums of squares neither underflow nor overflow.
pub fn power_of_two_scale(x: &Matrix) -> f64 {
    let largest = max_abs(x);
    if largest == 0.0 || !largest.is_finite() {
        return 1.0;
    }
    let exponent = (largest.log2().floor() as i32).clamp(-MAX_SCALE_EXPONENT, MAX_SCALE_EXPONENT);
    2.0_f64.powi(exponent)
}

/// Outer product `a * b^T`.
pub fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Matrix {
    a.insert_axis(Axis(1)).dot(&b.insert_axis(Axis(0)))
}

#[derive(Clone, Debug)]
pub struct SingularTriplet {
    pub value: f64,
    pub left: Vector,
    pub right: Vector,
}

/// Leading singular value and vectors by alternating power iteration.
///
/// The iteration starts from the column with the largest norm, which always
/// lies in the range of `x`. A zero matrix yields a zero triplet.
pub fn leading_singular_triplet(x: &Matrix) -> SingularTriplet {
    let (m, n) = x.dim();
    let zero = SingularTriplet {
        value: 0.0,
        left: Vector::zeros(m),
        right: Vector::zeros(n),
    };

    let start = x
        .axis_iter(Axis(1))
        .map(|column| (norm(column), column))
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let (start_norm, start_column) = match start {
        Some(start) if start.0 > 0.0 => start,
        _ => return zero,
    };

    let mut left = start_column.to_owned() / start_norm;
    let mut right = Vector::zeros(n);
    let mut value = 0.0;

    for _ in 0..POWER_MAX_ITER {
        let xtu = x.t().dot(&left);
        let xtu_norm = norm(xtu.view());
        if xtu_norm <= 0.0 {
            return zero;
        }
        right = xtu / xtu_norm;

        let xv = x.dot(&right);
        let sigma = norm(xv.view());
        if sigma <= 0.0 {
            return zero;
        }
        left = xv / sigma;

        let settled = (sigma - value).abs() <= POWER_TOLERANCE * sigma;
        value = sigma;
        if settled {
            break;
        }
    }

    SingularTriplet { value, left, right }
}

/// Largest singular value (operator 2-norm).
pub fn spectral_norm(x: &Matrix) -> f64 {
    leading_singular_triplet(x).value
}

/// Thin singular value decomposition `a = u * diag(s) * v^T`.
///
/// With k = min(m, n): `u` is m × k, `s` has k entries sorted in descending
/// order and `v` is n × k. Columns of `u` belonging to zero singular values
/// are left at zero.
#[derive(Clone, Debug)]
pub struct Svd {
    pub u: Matrix,
    pub s: Vector,
    pub v: Matrix,
}

/// One-sided (Hestenes) Jacobi SVD.
///
/// Column pairs are rotated until every pair is numerically orthogonal; the
/// singular values are then the column norms. Wide matrices are factored
/// through their transpose.
pub fn jacobi_svd(a: &Matrix) -> Result<Svd, RoslError> {
    if !is_finite(a) {
        return Err(RoslError::numerical("jacobi svd", 0, "input contains non-finite values"));
    }

    if a.ncols() > a.nrows() {
        let svd = jacobi_svd(&a.t().to_owned())?;
        return Ok(Svd {
            u: svd.v,
            s: svd.s,
            v: svd.u,
        });
    }

    let (m, n) = a.dim();
    let mut u = a.clone();
    let mut v = Matrix::eye(n);
    let tolerance = (m.max(1) as f64).sqrt() * f64::EPSILON;
    // Columns below this squared norm are round-off and never rotated
    let floor = (f64::EPSILON * frobenius_norm(a)).powi(2);

    let mut converged = false;
    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut rotated = false;

        for p in 0..n {
            for q in (p + 1)..n {
                let alpha = u.column(p).dot(&u.column(p));
                let beta = u.column(q).dot(&u.column(q));
                if alpha <= floor || beta <= floor {
                    continue;
                }

                let gamma = u.column(p).dot(&u.column(q));
                if gamma.abs() <= tolerance * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                rotate_columns(&mut u, p, q, c, s);
                rotate_columns(&mut v, p, q, c, s);
            }
        }

        if !rotated {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(RoslError::numerical(
            "jacobi svd",
            JACOBI_MAX_SWEEPS,
            format!("no convergence for a {}x{} matrix", m, n),
        ));
    }

    let norms: Vec<f64> = u.axis_iter(Axis(1)).map(norm).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| norms[j].partial_cmp(&norms[i]).unwrap_or(Ordering::Equal));

    let mut u_sorted = Matrix::zeros((m, n));
    let mut s_sorted = Vector::zeros(n);
    let mut v_sorted = Matrix::zeros((n, n));

    for (k, &j) in order.iter().enumerate() {
        s_sorted[k] = norms[j];
        if norms[j] > 0.0 {
            u_sorted.column_mut(k).assign(&(&u.column(j) / norms[j]));
        }
        v_sorted.column_mut(k).assign(&v.column(j));
    }

    Ok(Svd {
        u: u_sorted,
        s: s_sorted,
        v: v_sorted,
    })
}

fn rotate_columns(x: &mut Matrix, p: usize, q: usize, c: f64, s: f64) {
    for i in 0..x.nrows() {
        let xp = x[[i, p]];
        let xq = x[[i, q]];
        x[[i, p]] = c * xp - s * xq;
        x[[i, q]] = s * xp + c * xq;
    }
}

/// Moore-Penrose pseudo-inverse via the Jacobi SVD.
///
/// Singular values below `max(m, n) * eps * s_max` are treated as zero.
pub fn pseudo_inverse(a: &Matrix) -> Result<Matrix, RoslError> {
    let (m, n) = a.dim();
    let svd = jacobi_svd(a)?;

    let s_max = svd.s.iter().cloned().fold(0.0, f64::max);
    let cutoff = m.max(n) as f64 * f64::EPSILON * s_max;

    let mut pinv = Matrix::zeros((n, m));
    for k in 0..svd.s.len() {
        let sigma = svd.s[k];
        if sigma > cutoff && sigma > 0.0 {
            pinv.scaled_add(1.0 / sigma, &outer(svd.v.column(k), svd.u.column(k)));
        }
    }

    Ok(pinv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
    }

    #[test]
    fn test_shrink_matrix() {
        let x = array![[2.0, -0.1], [0.0, -4.0]];
        let shrunk = shrink(&x, 0.5);
        assert_eq!(shrunk, array![[1.5, 0.0], [0.0, -3.5]]);
    }

    #[test]
    fn test_norms() {
        let x = array![[3.0, 0.0], [0.0, -4.0]];
        assert!((frobenius_norm(&x) - 5.0).abs() < 1e-12);
        assert_eq!(max_abs(&x), 4.0);
        assert!((spectral_norm(&x) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_leading_singular_triplet_rank_one() {
        let u = array![1.0, 2.0, 2.0];
        let v = array![3.0, 4.0];
        let x = outer(u.view(), v.view());

        let triplet = leading_singular_triplet(&x);
        assert!((triplet.value - 15.0).abs() < 1e-9);

        let rebuilt = outer(triplet.left.view(), triplet.right.view()) * triplet.value;
        let diff = &x - &rebuilt;
        assert!(frobenius_norm(&diff) < 1e-9);
    }

    #[test]
    fn test_leading_singular_triplet_zero_matrix() {
        let x = Matrix::zeros((3, 2));
        let triplet = leading_singular_triplet(&x);
        assert_eq!(triplet.value, 0.0);
        assert_eq!(triplet.left.len(), 3);
        assert_eq!(triplet.right.len(), 2);
    }

    #[test]
    fn test_jacobi_svd_reconstruction() {
        let a = array![
            [4.0, 1.0, -2.0],
            [1.0, 3.0, 0.5],
            [-2.0, 0.5, 5.0],
            [0.0, 1.0, 1.0]
        ];

        let svd = jacobi_svd(&a).unwrap();
        assert_eq!(svd.u.shape(), &[4, 3]);
        assert_eq!(svd.v.shape(), &[3, 3]);

        // Descending order
        assert!(svd.s[0] >= svd.s[1] && svd.s[1] >= svd.s[2]);

        let sigma = Matrix::from_diag(&svd.s);
        let rebuilt = svd.u.dot(&sigma).dot(&svd.v.t());
        let diff = &a - &rebuilt;
        assert!(frobenius_norm(&diff) < 1e-10);

        // Orthonormal right singular vectors
        let vtv = svd.v.t().dot(&svd.v);
        let identity_gap = &vtv - &Matrix::eye(3);
        assert!(frobenius_norm(&identity_gap) < 1e-10);
    }

    #[test]
    fn test_jacobi_svd_rank_deficient() {
        let a = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let svd = jacobi_svd(&a).unwrap();
        assert!(svd.s[0] > 1.0);
        assert!(svd.s[1] < 1e-10);
    }

    #[test]
    fn test_jacobi_svd_wide_matrix() {
        let a = array![[1.0, 0.0, 2.0], [0.0, 3.0, 1.0]];

        let svd = jacobi_svd(&a).unwrap();
        assert_eq!(svd.u.shape(), &[2, 2]);
        assert_eq!(svd.s.len(), 2);
        assert_eq!(svd.v.shape(), &[3, 2]);
        assert!(svd.s[0] >= svd.s[1]);

        let rebuilt = svd.u.dot(&Matrix::from_diag(&svd.s)).dot(&svd.v.t());
        let diff = &a - &rebuilt;
        assert!(frobenius_norm(&diff) < 1e-10);
    }

    #[test]
    fn test_pseudo_inverse_wide() {
        // Fewer rows than columns, as for a short row sample of a basis
        let a = array![[0.2, -0.5, 0.1], [0.4, 0.3, -0.6]];
        let pinv = pseudo_inverse(&a).unwrap();
        assert_eq!(pinv.shape(), &[3, 2]);

        let product = a.dot(&pinv);
        let gap = &product - &Matrix::eye(2);
        assert!(frobenius_norm(&gap) < 1e-10);
    }

    #[test]
    fn test_power_of_two_scale() {
        let x = array![[3.0, -0.5], [0.0, -6.5]];
        assert_eq!(power_of_two_scale(&x), 4.0);

        assert_eq!(power_of_two_scale(&Matrix::zeros((2, 2))), 1.0);

        let tiny = array![[1e-170, 0.0]];
        let scaled = &tiny / power_of_two_scale(&tiny);
        assert!(scaled[[0, 0]] >= 1.0 && scaled[[0, 0]] < 2.0);

        let huge = array![[1e200, -3e200]];
        let scaled = &huge / power_of_two_scale(&huge);
        assert!(frobenius_norm(&scaled).is_finite());
        assert!(max_abs(&scaled) >= 1.0 && max_abs(&scaled) < 2.0);
    }

    #[test]
    fn test_jacobi_svd_rejects_nan() {
        let a = array![[1.0, f64::NAN], [0.0, 1.0]];
        assert!(matches!(jacobi_svd(&a), Err(RoslError::NumericalFailure { .. })));
    }

    #[test]
    fn test_pseudo_inverse_full_column_rank() {
        let a = array![[1.0, 0.0], [1.0, 1.0], [0.0, 2.0]];
        let pinv = pseudo_inverse(&a).unwrap();
        assert_eq!(pinv.shape(), &[2, 3]);

        let product = pinv.dot(&a);
        let gap = &product - &Matrix::eye(2);
        assert!(frobenius_norm(&gap) < 1e-10);
    }

    #[test]
    fn test_pseudo_inverse_rank_deficient() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let pinv = pseudo_inverse(&a).unwrap();

        // Penrose condition: A * A+ * A = A
        let rebuilt = a.dot(&pinv).dot(&a);
        let diff = &a - &rebuilt;
        assert!(frobenius_norm(&diff) < 1e-10);
    }
}
