use super::config::{Method, RoslConfig};
use super::{alm, subsample};
use crate::error::RoslError;
use crate::linalg::{is_finite, power_of_two_scale};
use crate::Matrix;
use log::{debug, warn};
use ndarray::{s, ArrayView2, ShapeBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The relative residual fell below the tolerance.
    Converged,
    /// The iteration cap was reached first; the factors are a best effort.
    IterationLimit,
}

/// Low-rank plus sparse split `X = D * alpha + E`.
///
/// `basis`, `coefficients` and `error` all have the shape of the input and
/// are stored column-major. Only the first `rank` columns of `basis` and the
/// first `rank` rows of `coefficients` carry data; the rest is zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Decomposition {
    pub rank: usize,
    pub basis: Matrix,
    pub coefficients: Matrix,
    pub error: Matrix,
    /// Solver iterations performed. In subsample mode this is the subspace
    /// iterations plus the regression iterations, so it can reach twice
    /// the configured `iters`.
    pub iterations: usize,
    pub residual: f64,
    pub stop_reason: StopReason,
}

impl Decomposition {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    /// The orthonormal basis D, n_samples × rank.
    pub fn basis_columns(&self) -> ArrayView2<'_, f64> {
        self.basis.slice(s![.., ..self.rank])
    }

    /// The coefficients alpha, rank × n_features.
    pub fn coefficient_rows(&self) -> ArrayView2<'_, f64> {
        self.coefficients.slice(s![..self.rank, ..])
    }

    /// D * alpha.
    pub fn low_rank(&self) -> Matrix {
        if self.rank == 0 {
            return Matrix::zeros(self.error.raw_dim());
        }
        self.basis_columns().dot(&self.coefficient_rows())
    }

    /// D * alpha + E.
    pub fn reconstruct(&self) -> Matrix {
        self.low_rank() + &self.error
    }
}

fn check_input(x: &Matrix) -> Result<(), RoslError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(RoslError::InvalidInput(
            "Input matrix must have at least one sample and one feature".to_string(),
        ));
    }
    if !is_finite(x) {
        return Err(RoslError::InvalidInput(
            "Input matrix contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Copy the truncated factors into full-size column-major buffers.
fn assemble(
    shape: (usize, usize),
    basis: &Matrix,
    coefficients: &Matrix,
    error: &Matrix,
) -> (Matrix, Matrix, Matrix) {
    let rank = basis.ncols();

    let mut full_basis = Matrix::zeros(shape.f());
    full_basis.slice_mut(s![.., ..rank]).assign(basis);

    let mut full_coefficients = Matrix::zeros(shape.f());
    full_coefficients.slice_mut(s![..rank, ..]).assign(coefficients);

    let mut full_error = Matrix::zeros(shape.f());
    full_error.assign(error);

    (full_basis, full_coefficients, full_error)
}

/// Split `x` into a low-rank subspace model and a sparse error term.
///
/// The configuration is validated against the shape of `x` before anything
/// is allocated. Hitting the iteration cap is not an error: the result then
/// carries [`StopReason::IterationLimit`].
pub fn decompose(x: &Matrix, config: &RoslConfig) -> Result<Decomposition, RoslError> {
    config.validate()?;
    check_input(x)?;
    config.validate_for_shape(x.dim())?;

    let mut rng = match config.random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    debug!(
        "decomposing {}x{} matrix with {:?}, initial rank {}, reg {}",
        x.nrows(),
        x.ncols(),
        config.method,
        config.rank,
        config.reg
    );

    // Solve on x / 2^k with max |x / 2^k| in [1, 2); alpha and E scale back
    let scale = power_of_two_scale(x);
    let scaled = x / scale;

    let (basis, coefficients, error, iterations, residual, converged) = match config.method {
        Method::Full => {
            let outcome = alm::solve(&scaled, config, config.rank, &mut rng)?;
            (
                outcome.subspace.basis_matrix(),
                outcome.subspace.coefficient_matrix(),
                outcome.sparse,
                outcome.iterations,
                outcome.residual,
                outcome.converged,
            )
        }
        Method::Subsample { rows, cols } => {
            let outcome = subsample::solve(&scaled, config, rows, cols, &mut rng)?;
            (
                outcome.basis,
                outcome.coefficients,
                outcome.error,
                outcome.iterations,
                outcome.residual,
                outcome.converged,
            )
        }
    };

    let coefficients = coefficients * scale;
    let error = error * scale;
    if !is_finite(&coefficients) || !is_finite(&error) {
        return Err(RoslError::numerical(
            "rescale",
            iterations,
            format!("factors overflow when scaled back by {:e}", scale),
        ));
    }

    let rank = basis.ncols();
    let stop_reason = if converged {
        StopReason::Converged
    } else {
        warn!(
            "ROSL did not converge within {} iterations (relative residual {:.3e}, tol {:.1e})",
            config.iters, residual, config.tol
        );
        StopReason::IterationLimit
    };

    let (basis, coefficients, error) = assemble(x.dim(), &basis, &coefficients, &error);

    Ok(Decomposition {
        rank,
        basis,
        coefficients,
        error,
        iterations,
        residual,
        stop_reason,
    })
}

/// Estimator wrapper around [`decompose`].
///
/// After `fit`, the learned basis can project new columns (`transform`) and
/// map coefficients back to data space (`inverse_transform`).
#[derive(Clone, Debug)]
pub struct Rosl {
    pub basis: Option<Matrix>,
    pub coefficients: Option<Matrix>,
    pub residuals: Option<Matrix>,
    pub rank: Option<usize>,
    config: RoslConfig,
}

impl Rosl {
    pub fn new(config: RoslConfig) -> Self {
        Self {
            basis: None,
            coefficients: None,
            residuals: None,
            rank: None,
            config,
        }
    }

    pub fn config(&self) -> &RoslConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<(), RoslError> {
        self.fit_transform(x).map(|_| ())
    }

    pub fn fit_transform(&mut self, x: &Matrix) -> Result<Decomposition, RoslError> {
        let result = decompose(x, &self.config)?;

        self.basis = Some(result.basis_columns().to_owned());
        self.coefficients = Some(result.coefficient_rows().to_owned());
        self.residuals = Some(result.error.clone());
        self.rank = Some(result.rank);

        Ok(result)
    }

    /// Coefficients `D^T * x` of the columns of `x` in the learned basis.
    pub fn transform(&self, x: &Matrix) -> Result<Matrix, RoslError> {
        let basis = self.basis.as_ref().ok_or(RoslError::NotFitted)?;

        if x.nrows() != basis.nrows() {
            return Err(RoslError::ShapeMismatch(format!(
                "Number of rows in X ({}) doesn't match training data ({})",
                x.nrows(),
                basis.nrows()
            )));
        }

        Ok(basis.t().dot(x))
    }

    pub fn inverse_transform(&self, coefficients: &Matrix) -> Result<Matrix, RoslError> {
        let basis = self.basis.as_ref().ok_or(RoslError::NotFitted)?;

        if coefficients.nrows() != basis.ncols() {
            return Err(RoslError::ShapeMismatch(format!(
                "Number of coefficient rows ({}) doesn't match the learned rank ({})",
                coefficients.nrows(),
                basis.ncols()
            )));
        }

        Ok(basis.dot(coefficients))
    }
}

impl Default for Rosl {
    fn default() -> Self {
        Self::new(RoslConfig::default())
    }
}
