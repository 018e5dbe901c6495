use thiserror::Error;

/// A result type for multi-fidelity optimization errors
pub type Result<T> = std::result::Result<T, MfkgError>;

/// An error for cost-aware multi-fidelity bayesian optimization
#[derive(Error, Debug)]
pub enum MfkgError {
    /// When a configuration parameter or an input is invalid
    #[error("Invalid `{param}`: {msg}")]
    ValidationError {
        /// Name of the offending parameter
        param: String,
        /// Reason of the rejection
        msg: String,
    },
    /// When the surrogate model can not be fitted even after a jittered retry
    #[error("Surrogate fit error: {0}")]
    FitError(String),
    /// When an invalid value is encountered during computations
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When an operation requires data which is not available yet
    #[error("Not fitted error: {0}")]
    NotFittedError(String),
    /// When a GP error occurs
    #[error(transparent)]
    GpError(#[from] mfkg_gp::GpError),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When an array reshaping fails
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    /// When an Argmin framework error is raised
    #[error(transparent)]
    ArgminError(#[from] argmin::core::Error),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    /// When csv writing fails
    #[error("CSV error")]
    CsvError(#[from] csv::Error),
    /// When json (de)serialization fails
    #[error("JSON error")]
    JsonError(#[from] serde_json::Error),
}

impl MfkgError {
    pub(crate) fn validation(param: &str, msg: impl Into<String>) -> Self {
        MfkgError::ValidationError {
            param: param.to_string(),
            msg: msg.into(),
        }
    }
}
