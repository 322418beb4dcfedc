use crate::error::RoslError;

/// Which part of the data each solve works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Use the full data matrix.
    Full,
    /// ROSL+: learn the subspace from `cols` sampled columns, then regress
    /// every column onto it using `rows` sampled rows.
    Subsample { rows: usize, cols: usize },
}

/// Solver configuration.
///
/// Built with chained setters and handed to [`decompose`](super::decompose)
/// by reference; the solver never mutates it. Fields are public for
/// reading; `decompose` validates them before use.
#[derive(Clone, Debug, PartialEq)]
pub struct RoslConfig {
    pub method: Method,
    /// Initial estimate of the subspace dimension.
    pub rank: usize,
    /// Weight of the l1 penalty on the sparse error term.
    pub reg: f64,
    pub tol: f64,
    pub iters: usize,
    pub verbose: bool,
    pub random_state: Option<u64>,
}

impl RoslConfig {
    pub fn new() -> Self {
        Self {
            method: Method::Full,
            rank: 5,
            reg: 0.01,
            tol: 1e-6,
            iters: 500,
            verbose: false,
            random_state: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn subsample(self, rows: usize, cols: usize) -> Self {
        self.method(Method::Subsample { rows, cols })
    }

    pub fn rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn reg(mut self, reg: f64) -> Self {
        self.reg = reg;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn iters(mut self, iters: usize) -> Self {
        self.iters = iters;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Checks that do not depend on the data.
    pub fn validate(&self) -> Result<(), RoslError> {
        if self.rank == 0 {
            return Err(RoslError::config("rank", self.rank, "must be >= 1"));
        }
        if !(self.reg.is_finite() && self.reg > 0.0) {
            return Err(RoslError::config("reg", self.reg, "must be a positive finite number"));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(RoslError::config("tol", self.tol, "must be a positive finite number"));
        }
        if self.iters == 0 {
            return Err(RoslError::config("iters", self.iters, "must be >= 1"));
        }
        if let Method::Subsample { rows, cols } = self.method {
            if rows == 0 || cols == 0 {
                return Err(RoslError::config(
                    "sampling",
                    format!("({}, {})", rows, cols),
                    "'method' is set to subsample but the sampling size is empty",
                ));
            }
        }
        Ok(())
    }

    /// Checks against the shape of the matrix about to be decomposed.
    pub fn validate_for_shape(
        &self,
        (n_samples, n_features): (usize, usize),
    ) -> Result<(), RoslError> {
        self.validate()?;

        let max_rank = n_samples.min(n_features);
        if self.rank > max_rank {
            return Err(RoslError::config(
                "rank",
                self.rank,
                format!("cannot be larger than min(n_samples, n_features)={}", max_rank),
            ));
        }

        if let Method::Subsample { rows, cols } = self.method {
            if rows > n_samples || cols > n_features {
                return Err(RoslError::config(
                    "sampling",
                    format!("({}, {})", rows, cols),
                    format!(
                        "is greater than the dimensions of X ({}, {})",
                        n_samples, n_features
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for RoslConfig {
    fn default() -> Self {
        Self::new()
    }
}
