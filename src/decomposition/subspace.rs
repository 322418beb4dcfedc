use crate::linalg::{leading_singular_triplet, norm, outer};
use crate::{Matrix, Vector};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

// A grown direction shorter than this after re-orthogonalization is noise.
const MIN_GROWTH_NORM: f64 = 1e-12;

/// Low-rank model `D * alpha` kept as orthonormal basis columns of D paired
/// with the matching rows of alpha.
#[derive(Clone, Debug)]
pub(crate) struct Subspace {
    basis: Vec<Vector>,
    coefficients: Vec<Vector>,
    n_rows: usize,
    n_cols: usize,
}

impl Subspace {
    pub(crate) fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self {
            basis: Vec::new(),
            coefficients: Vec::new(),
            n_rows,
            n_cols,
        }
    }

    /// Zero basis with uniform random coefficient rows; the first sweep
    /// derives the basis from them.
    pub(crate) fn random(rank: usize, n_rows: usize, n_cols: usize, rng: &mut StdRng) -> Self {
        let coefficients = (0..rank)
            .map(|_| Vector::random_using(n_cols, Uniform::new(0.0, 1.0), rng))
            .collect();
        let basis = (0..rank).map(|_| Vector::zeros(n_rows)).collect();

        Self {
            basis,
            coefficients,
            n_rows,
            n_cols,
        }
    }

    pub(crate) fn rank(&self) -> usize {
        self.basis.len()
    }

    pub(crate) fn low_rank(&self) -> Matrix {
        let mut approx = Matrix::zeros((self.n_rows, self.n_cols));
        for (d, a) in self.basis.iter().zip(self.coefficients.iter()) {
            approx += &outer(d.view(), a.view());
        }
        approx
    }

    /// D as an n_rows × rank matrix.
    pub(crate) fn basis_matrix(&self) -> Matrix {
        Matrix::from_shape_fn((self.n_rows, self.rank()), |(i, j)| self.basis[j][i])
    }

    /// alpha as a rank × n_cols matrix.
    pub(crate) fn coefficient_matrix(&self) -> Matrix {
        Matrix::from_shape_fn((self.rank(), self.n_cols), |(i, j)| self.coefficients[i][j])
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.basis
            .iter()
            .chain(self.coefficients.iter())
            .all(|v| v.iter().all(|x| x.is_finite()))
    }

    /// One block coordinate pass over the components against `target`.
    ///
    /// Each basis column is refit to the residual left by the other
    /// components, orthogonalized against the columns already visited and
    /// normalized. Its coefficient row is the projection of that residual,
    /// with the row norm shrunk by `tau`. Components whose row shrinks to
    /// zero are dropped, which lowers the rank.
    pub(crate) fn sweep(&mut self, target: &Matrix, tau: f64) {
        let mut approx = self.low_rank();

        for i in 0..self.rank() {
            let mut residual = target - &approx;
            residual += &outer(self.basis[i].view(), self.coefficients[i].view());

            let mut direction = residual.dot(&self.coefficients[i]);
            let mut direction_norm = norm(direction.view());
            if direction_norm > 0.0 {
                for j in 0..i {
                    let projection = self.basis[j].dot(&direction);
                    direction.scaled_add(-projection, &self.basis[j]);
                }
                direction_norm = norm(direction.view());
            }

            if direction_norm > f64::MIN_POSITIVE {
                direction /= direction_norm;
                let mut coeffs = residual.t().dot(&direction);
                let coeff_norm = norm(coeffs.view());
                let scale = if coeff_norm > 0.0 {
                    (coeff_norm - tau).max(0.0) / coeff_norm
                } else {
                    0.0
                };
                coeffs *= scale;

                self.basis[i] = direction;
                self.coefficients[i] = coeffs;
            } else {
                self.basis[i] = Vector::zeros(self.n_rows);
                self.coefficients[i] = Vector::zeros(self.n_cols);
            }

            // target - residual is the sum of the other components
            approx = target - &residual;
            approx += &outer(self.basis[i].view(), self.coefficients[i].view());
        }

        self.prune();
    }

    /// Append directions of `target` the basis does not span yet.
    ///
    /// While the part of `target` outside span(D) has a leading singular
    /// value above `tau` and the rank is below `max_rank`, its leading left
    /// singular vector joins the basis with a shrunk coefficient row.
    /// Returns the number of components added.
    pub(crate) fn grow(&mut self, target: &Matrix, tau: f64, max_rank: usize) -> usize {
        let mut added = 0;

        while self.rank() < max_rank {
            let mut outside = target.clone();
            for d in self.basis.iter() {
                let weights = target.t().dot(d);
                outside -= &outer(d.view(), weights.view());
            }

            let leading = leading_singular_triplet(&outside);
            if leading.value <= tau {
                break;
            }

            let mut direction = leading.left;
            for d in self.basis.iter() {
                let projection = d.dot(&direction);
                direction.scaled_add(-projection, d);
            }
            let direction_norm = norm(direction.view());
            if direction_norm < MIN_GROWTH_NORM {
                break;
            }
            direction /= direction_norm;

            let mut coeffs = target.t().dot(&direction);
            let coeff_norm = norm(coeffs.view());
            if coeff_norm <= tau {
                break;
            }
            coeffs *= (coeff_norm - tau) / coeff_norm;

            self.basis.push(direction);
            self.coefficients.push(coeffs);
            added += 1;
        }

        added
    }

    fn prune(&mut self) {
        let basis = std::mem::take(&mut self.basis);
        let coefficients = std::mem::take(&mut self.coefficients);

        let (basis, coefficients): (Vec<Vector>, Vec<Vector>) = basis
            .into_iter()
            .zip(coefficients)
            .filter(|(_, a)| a.iter().any(|&v| v != 0.0))
            .unzip();

        self.basis = basis;
        self.coefficients = coefficients;
    }
}
