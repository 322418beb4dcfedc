use super::alm::{self, initial_multiplier, Penalty};
use super::config::RoslConfig;
use crate::error::RoslError;
use crate::linalg::{frobenius_norm, is_finite, pseudo_inverse, shrink, spectral_norm};
use crate::Matrix;
use log::{debug, info};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Result of a ROSL+ solve. `basis` is n_rows × rank and `coefficients`
/// is rank × n_cols.
pub(crate) struct SubsampleOutcome {
    pub(crate) basis: Matrix,
    pub(crate) coefficients: Matrix,
    pub(crate) error: Matrix,
    pub(crate) iterations: usize,
    pub(crate) residual: f64,
    pub(crate) converged: bool,
}

/// `count` distinct indices out of `0..len`, in ascending order.
pub(crate) fn sample_indices(len: usize, count: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices.truncate(count);
    indices.sort_unstable();
    indices
}

struct Regression {
    coefficients: Matrix,
    iterations: usize,
    residual: f64,
    converged: bool,
}

/// Robust regression of the sampled rows onto a fixed basis:
/// min ||E||_1 subject to X_R = D_R * alpha + E, solved with the same
/// multiplier schedule as the subspace step.
fn robust_regression(
    x_rows: &Matrix,
    basis_rows: &Matrix,
    config: &RoslConfig,
) -> Result<Regression, RoslError> {
    let n_cols = x_rows.ncols();
    let rank = basis_rows.ncols();

    let x_norm = frobenius_norm(x_rows);
    if x_norm == 0.0 {
        return Ok(Regression {
            coefficients: Matrix::zeros((rank, n_cols)),
            iterations: 0,
            residual: 0.0,
            converged: true,
        });
    }

    let projector = pseudo_inverse(basis_rows)?;
    let x_spectral = spectral_norm(x_rows);
    let mut multiplier = initial_multiplier(x_rows, x_spectral, 1.0);
    let mut penalty = Penalty::new(x_spectral);
    let mut sparse = Matrix::zeros(x_rows.raw_dim());
    let mut coefficients = Matrix::zeros((rank, n_cols));
    let mut residual = f64::INFINITY;

    for iteration in 1..=config.iters {
        let mu = penalty.value();
        let scaled_multiplier = &multiplier / mu;

        coefficients = projector.dot(&(x_rows - &sparse + &scaled_multiplier));
        let fitted = basis_rows.dot(&coefficients);
        sparse = shrink(&(x_rows - &fitted + &scaled_multiplier), 1.0 / mu);

        let gap = x_rows - &fitted - &sparse;
        multiplier.scaled_add(mu, &gap);
        penalty.step();

        residual = frobenius_norm(&gap) / x_norm;
        if !residual.is_finite() || !is_finite(&coefficients) {
            return Err(RoslError::numerical(
                "robust regression",
                iteration,
                format!("non-finite values (relative residual {})", residual),
            ));
        }

        if config.verbose {
            info!("regression iteration {}: residual {:.3e}, mu {:.3e}", iteration, residual, mu);
        } else {
            debug!("regression iteration {}: residual {:.3e}", iteration, residual);
        }

        if residual < config.tol {
            return Ok(Regression {
                coefficients,
                iterations: iteration,
                residual,
                converged: true,
            });
        }
    }

    Ok(Regression {
        coefficients,
        iterations: config.iters,
        residual,
        converged: false,
    })
}

/// ROSL+: learn the basis from `cols` sampled columns, then recover the
/// coefficients of every column from `rows` sampled rows.
pub(crate) fn solve(
    x: &Matrix,
    config: &RoslConfig,
    rows: usize,
    cols: usize,
    rng: &mut StdRng,
) -> Result<SubsampleOutcome, RoslError> {
    let (n_rows, n_cols) = x.dim();
    let row_sample = sample_indices(n_rows, rows, rng);
    let col_sample = sample_indices(n_cols, cols, rng);
    debug!("sampled {} rows and {} columns", row_sample.len(), col_sample.len());

    let x_cols = x.select(Axis(1), &col_sample);
    let learned = alm::solve(&x_cols, config, config.rank, rng)?;
    let basis = learned.subspace.basis_matrix();
    let rank = basis.ncols();

    if config.verbose {
        info!(
            "subspace learned from column sample: rank {} after {} iterations",
            rank, learned.iterations
        );
    }

    if rank == 0 {
        return Ok(SubsampleOutcome {
            basis,
            coefficients: Matrix::zeros((0, n_cols)),
            error: x.clone(),
            iterations: learned.iterations,
            residual: learned.residual,
            converged: learned.converged,
        });
    }

    let x_rows = x.select(Axis(0), &row_sample);
    let basis_rows = basis.select(Axis(0), &row_sample);
    let regression = robust_regression(&x_rows, &basis_rows, config)?;

    let error = x - &basis.dot(&regression.coefficients);

    Ok(SubsampleOutcome {
        basis,
        coefficients: regression.coefficients,
        error,
        iterations: learned.iterations + regression.iterations,
        residual: regression.residual,
        converged: learned.converged && regression.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::outer;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_sample_indices_sorted_and_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        let indices = sample_indices(10, 4, &mut rng);

        assert_eq!(indices.len(), 4);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < 10));
    }

    #[test]
    fn test_sample_indices_full_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sample_indices(5, 5, &mut rng), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_robust_regression_ignores_outlier() {
        let basis = array![[1.0], [2.0], [3.0], [4.0]] / 30.0_f64.sqrt();
        let mut x = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [3.0, 6.0, 9.0], [4.0, 8.0, 12.0]];
        x[[1, 2]] += 20.0;

        let config = RoslConfig::new().tol(1e-8);
        let fit = robust_regression(&x, &basis, &config).unwrap();
        assert!(fit.converged);

        // Clean coefficients are sqrt(30) * (1, 2, 3)
        let expected = array![[1.0, 2.0, 3.0]] * 30.0_f64.sqrt();
        let diff = &fit.coefficients - &expected;
        assert!(frobenius_norm(&diff) < 1e-3);
    }

    #[test]
    fn test_solve_recovers_noise_free_rank_two() {
        // Rows of u * v^T + u2 * v2^T with u = (1..6), v = (1, -1, 2, 0.5, 3),
        // u2 = (0.5, -1, 0, 2, 1, -2), v2 = (2, 1, 0, -1, 1)
        let u = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let v = array![1.0, -1.0, 2.0, 0.5, 3.0];
        let u2 = array![0.5, -1.0, 0.0, 2.0, 1.0, -2.0];
        let v2 = array![2.0, 1.0, 0.0, -1.0, 1.0];
        let x = outer(u.view(), v.view()) + outer(u2.view(), v2.view());

        let config = RoslConfig::new().rank(2).reg(1.0);
        let mut rng = StdRng::seed_from_u64(9);
        let outcome = solve(&x, &config, 4, 4, &mut rng).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.basis.shape(), &[6, 2]);
        assert_eq!(outcome.coefficients.shape(), &[2, 5]);

        let low_rank = outcome.basis.dot(&outcome.coefficients);
        let diff = &x - &low_rank;
        assert!(frobenius_norm(&diff) / frobenius_norm(&x) < 1e-4);
        assert!(frobenius_norm(&outcome.error) / frobenius_norm(&x) < 1e-4);
    }
}
