//! Error types for the cloud resource module.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors raised while modeling or inspecting cloud resources.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Network topology unsatisfiable: {0}")]
    TopologyUnsatisfiable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource output missing or malformed: {0}")]
    MalformedOutput(String),

    #[error("Unpaired network rule: {0}")]
    UnpairedRule(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
