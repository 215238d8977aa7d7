use thiserror::Error;

use crate::parameters::bounds::BoundsError;
use crate::parameters::parameter::ParameterError;

/// Error types for the xrffit-rs library.
#[derive(Error, Debug)]
pub enum XrfError {
    /// The spectrum is empty, has non-finite counts, or a bad energy calibration.
    #[error("Malformed spectrum: {0}")]
    MalformedSpectrum(String),

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for invalid parameter values.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Element symbol or line group missing from the reference table.
    #[error("Unknown element or line group: {0}")]
    UnknownElement(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ParameterError> for XrfError {
    fn from(err: ParameterError) -> Self {
        match err {
            ParameterError::Bounds(bounds) => XrfError::Bounds(bounds),
            ParameterError::NotFound { name } => XrfError::ParameterNotFound(name),
            other => XrfError::InvalidParameter(other.to_string()),
        }
    }
}

/// Result type alias for xrffit-rs operations.
pub type Result<T> = std::result::Result<T, XrfError>;
