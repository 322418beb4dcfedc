use super::config::RoslConfig;
use super::subspace::Subspace;
use crate::error::RoslError;
use crate::linalg::{frobenius_norm, is_finite, max_abs, shrink, spectral_norm};
use crate::Matrix;
use log::{debug, info};
use rand::rngs::StdRng;

const INITIAL_PENALTY: f64 = 1.25;
const PENALTY_GROWTH: f64 = 1.5;
const PENALTY_RANGE: f64 = 1e7;

/// Penalty parameter mu of the augmented Lagrangian: starts at
/// 1.25 / ||X||_2 and grows geometrically up to 1e7 times that.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Penalty {
    mu: f64,
    mu_max: f64,
}

impl Penalty {
    pub(crate) fn new(spectral_norm: f64) -> Self {
        let mu = INITIAL_PENALTY / spectral_norm;
        Self {
            mu,
            mu_max: mu * PENALTY_RANGE,
        }
    }

    pub(crate) fn value(&self) -> f64 {
        self.mu
    }

    pub(crate) fn step(&mut self) {
        self.mu = (self.mu * PENALTY_GROWTH).min(self.mu_max);
    }
}

/// Starting multiplier Y = X / max(||X||_2, ||X||_inf / lambda).
pub(crate) fn initial_multiplier(x: &Matrix, spectral_norm: f64, lambda: f64) -> Matrix {
    x / spectral_norm.max(max_abs(x) / lambda)
}

pub(crate) struct AlmOutcome {
    pub(crate) subspace: Subspace,
    pub(crate) sparse: Matrix,
    pub(crate) iterations: usize,
    pub(crate) residual: f64,
    pub(crate) converged: bool,
}

/// Inexact ALM solve of min ||alpha||_row-1 + lambda * ||E||_1
/// subject to X = D * alpha + E, D^T D = I.
///
/// `rank` is the initial subspace dimension; it is clamped to
/// min(n_rows, n_cols) and adapted every iteration.
pub(crate) fn solve(
    x: &Matrix,
    config: &RoslConfig,
    rank: usize,
    rng: &mut StdRng,
) -> Result<AlmOutcome, RoslError> {
    let (n_rows, n_cols) = x.dim();
    let max_rank = n_rows.min(n_cols);

    let x_norm = frobenius_norm(x);
    if x_norm == 0.0 {
        return Ok(AlmOutcome {
            subspace: Subspace::empty(n_rows, n_cols),
            sparse: Matrix::zeros((n_rows, n_cols)),
            iterations: 0,
            residual: 0.0,
            converged: true,
        });
    }

    let lambda = config.reg;
    let x_spectral = spectral_norm(x);
    let mut multiplier = initial_multiplier(x, x_spectral, lambda);
    let mut penalty = Penalty::new(x_spectral);

    let mut subspace = Subspace::random(rank.min(max_rank), n_rows, n_cols, rng);
    let mut sparse = Matrix::zeros((n_rows, n_cols));
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    for iteration in 1..=config.iters {
        iterations = iteration;
        let mu = penalty.value();
        let scaled_multiplier = &multiplier / mu;

        // Subspace step against X - E + Y / mu
        let target = x - &sparse + &scaled_multiplier;
        subspace.sweep(&target, 1.0 / mu);
        let grown = subspace.grow(&target, 1.0 / mu, max_rank);
        let low_rank = subspace.low_rank();

        // Sparse step
        sparse = shrink(&(x - &low_rank + &scaled_multiplier), lambda / mu);

        let gap = x - &low_rank - &sparse;
        multiplier.scaled_add(mu, &gap);
        penalty.step();

        residual = frobenius_norm(&gap) / x_norm;
        if !residual.is_finite() || !subspace.is_finite() || !is_finite(&sparse) {
            return Err(RoslError::numerical(
                "subspace update",
                iteration,
                format!("non-finite values (relative residual {})", residual),
            ));
        }

        if config.verbose {
            info!(
                "iteration {}: rank {} (+{}), residual {:.3e}, mu {:.3e}",
                iteration,
                subspace.rank(),
                grown,
                residual,
                mu
            );
        } else {
            debug!(
                "iteration {}: rank {}, residual {:.3e}",
                iteration,
                subspace.rank(),
                residual
            );
        }

        if residual < config.tol {
            return Ok(AlmOutcome {
                subspace,
                sparse,
                iterations,
                residual,
                converged: true,
            });
        }
    }

    Ok(AlmOutcome {
        subspace,
        sparse,
        iterations,
        residual,
        converged: false,
    })
}
