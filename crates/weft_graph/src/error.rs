//! Error types for the graph module.

use thiserror::Error;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while building or deploying a resource graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate resource name: {0}")]
    DuplicateResource(String),

    #[error("Resource '{resource}' depends on unknown resource '{dependency}'")]
    UnknownDependency { resource: String, dependency: String },

    #[error("Dependency cycle involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Resource '{resource}' has no output named '{output}'")]
    MissingOutput { resource: String, output: String },

    #[error("Provisioning failed for resource '{resource}': {reason}")]
    ProvisioningFailed { resource: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid deployment state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
