use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoslError {
    #[error("Invalid configuration: {parameter}={value} ({reason})")]
    InvalidConfiguration {
        parameter: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid input matrix: {0}")]
    InvalidInput(String),

    #[error("Numerical failure in {stage} at iteration {iteration}: {reason}")]
    NumericalFailure {
        stage: &'static str,
        iteration: usize,
        reason: String,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Rosl not fitted. Call fit() first.")]
    NotFitted,
}

impl RoslError {
    pub(crate) fn config(
        parameter: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        RoslError::InvalidConfiguration {
            parameter,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn numerical(
        stage: &'static str,
        iteration: usize,
        reason: impl Into<String>,
    ) -> Self {
        RoslError::NumericalFailure {
            stage,
            iteration,
            reason: reason.into(),
        }
    }
}
