//! Robust low-rank plus sparse decomposition.
//!
//! This module splits a data matrix `X` into an orthonormal subspace model
//! and a sparse error term, `X = D * alpha + E`:
//! - `decompose`: one-shot solve returning a `Decomposition`
//! - `RoslConfig`: solver settings, built with chained setters
//! - `Rosl`: estimator that keeps the learned basis for projecting new data
//!
//! Two methods are available. `Method::Full` runs the inexact augmented
//! Lagrange multiplier solver on the whole matrix. `Method::Subsample`
//! (ROSL+) learns the basis from a column sample and recovers the
//! coefficients by robust regression on a row sample, which is much cheaper
//! on large inputs.
//!
//! # Examples
//!
//! ## Separating outliers
//! ```rust
//! use rosl::{decompose, Matrix, RoslConfig};
//! use ndarray::array;
//!
//! let u = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let mut x = Matrix::from_shape_fn((6, 6), |(i, j)| u[i] * u[j]);
//! x[[2, 3]] += 25.0;
//!
//! let config = RoslConfig::new()
//!     .rank(1)
//!     .reg(1.0 / 6.0_f64.sqrt())
//!     .tol(1e-7)
//!     .random_state(0);
//! let result = decompose(&x, &config).unwrap();
//!
//! println!("estimated rank: {}", result.rank);
//! println!("outlier: {:.3}", result.error[[2, 3]]);
//! ```
//!
//! ## Sub-sampled decomposition with the estimator
//! ```rust
//! use rosl::{Matrix, Rosl, RoslConfig};
//!
//! let x = Matrix::from_shape_fn((40, 30), |(i, j)| {
//!     (0.3 * i as f64).sin() * (0.2 * j as f64).cos()
//! });
//!
//! let mut rosl = Rosl::new(RoslConfig::new().subsample(20, 15).rank(3).reg(0.5).random_state(1));
//! let result = rosl.fit_transform(&x).unwrap();
//!
//! // Project the data onto the learned basis and back
//! let coefficients = rosl.transform(&x).unwrap();
//! let reconstructed = rosl.inverse_transform(&coefficients).unwrap();
//! assert_eq!(reconstructed.dim(), x.dim());
//! assert_eq!(coefficients.nrows(), result.rank);
//! ```

mod alm;
mod config;
mod rosl;
mod subsample;
mod subspace;

pub use config::{Method, RoslConfig};
pub use rosl::{decompose, Decomposition, Rosl, StopReason};
