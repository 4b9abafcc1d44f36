//! Error types for the permission module.

use thiserror::Error;

/// Result type alias for permission operations.
pub type IamResult<T> = Result<T, IamError>;

/// Errors raised while synthesizing or verifying grants.
#[derive(Error, Debug)]
pub enum IamError {
    #[error("Grant for '{principal}' names resource '{resource}' the principal was not wired to")]
    UnwiredResource { principal: String, resource: String },

    #[error("Grant for '{principal}' uses an unscoped selector without a justification: {actions:?}")]
    UnjustifiedWildcard {
        principal: String,
        actions: Vec<String>,
    },

    #[error("Grant for '{principal}' has an empty {what} set")]
    EmptyGrant { principal: String, what: String },
}
