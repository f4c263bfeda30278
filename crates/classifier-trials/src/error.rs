use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TrialError>;

/// Errors raised while fitting, evaluating or tuning classifiers.
#[derive(Error, Debug)]
pub enum TrialError {
    /// Malformed or misaligned training/test data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model cannot produce the requested prediction kind.
    #[error("Model '{model}' does not support probability estimates")]
    UnsupportedCapability { model: String },

    /// No candidate of a parameter grid could be evaluated.
    #[error("Grid search failed for '{model}': {reason}")]
    SearchFailure { model: String, reason: String },

    #[error("Invalid parameter for '{model}': {name} = {value}, {reason}")]
    InvalidParameter {
        model: String,
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model '{model}' is not fitted yet")]
    NotFitted { model: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl TrialError {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        TrialError::InvalidInput(msg.into())
    }

    pub(crate) fn invalid_parameter(
        model: &str,
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TrialError::InvalidParameter {
            model: model.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TrialError {
    fn from(err: serde_json::Error) -> Self {
        TrialError::Serialization(err.to_string())
    }
}
