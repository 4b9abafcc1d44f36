//! Error types for the parameter channel.

use thiserror::Error;

/// Result type alias for channel operations.
pub type ParamResult<T> = Result<T, ParamError>;

/// Errors that can occur against the parameter channel.
#[derive(Error, Debug)]
pub enum ParamError {
    #[error("Missing parameter: {0} (was the backend topology deployed first?)")]
    MissingParameter(String),

    #[error("Parameter '{key}' is owned by topology '{owner}'")]
    ForeignKey { key: String, owner: String },

    #[error("Key '{0}' is outside the channel namespace")]
    OutsideNamespace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
