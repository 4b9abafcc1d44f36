//! Error types for the topology assemblies.

use thiserror::Error;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors raised while planning or deploying a topology.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cloud resource error: {0}")]
    Cloud(#[from] weft_cloud::CloudError),

    #[error("Graph error: {0}")]
    Graph(#[from] weft_graph::GraphError),

    #[error("Dependency resolution error: {0}")]
    Param(#[from] weft_params::ParamError),

    #[error("Permission error: {0}")]
    Iam(#[from] weft_iam::IamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] serde_yaml::Error),
}
