//! Principals, actions and grants.

use serde::{Deserialize, Serialize};

/// An identity that is granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Principal {
    /// The compute unit executing application logic.
    ComputeUnit(String),
    /// An out-of-band batch-processing principal (e.g. an indexing job).
    ExternalJob(String),
}

impl Principal {
    pub fn name(&self) -> &str {
        match self {
            Principal::ComputeUnit(n) | Principal::ExternalJob(n) => n,
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::ComputeUnit(n) => write!(f, "compute:{n}"),
            Principal::ExternalJob(n) => write!(f, "job:{n}"),
        }
    }
}

/// Action names grouped by service.
pub mod actions {
    /// Read a configuration parameter.
    pub const PARAMETER_READ: &[&str] = &["ssm:GetParameter"];

    /// Read a secret value.
    pub const SECRET_READ: &[&str] = &["secretsmanager:GetSecretValue"];

    /// Read/write conversation state in the key-value table.
    pub const TABLE_READ_WRITE: &[&str] = &[
        "dynamodb:BatchGetItem",
        "dynamodb:BatchWriteItem",
        "dynamodb:DeleteItem",
        "dynamodb:GetItem",
        "dynamodb:PutItem",
        "dynamodb:Query",
        "dynamodb:UpdateItem",
    ];

    /// Object-store actions scoped to one bucket and its objects.
    pub const BUCKET_READ_WRITE: &[&str] = &[
        "s3:DeleteObject",
        "s3:GetObject",
        "s3:ListBucket",
        "s3:PutObject",
    ];

    /// Invoke a compute function.
    pub const FUNCTION_INVOKE: &[&str] = &["lambda:InvokeFunction"];

    /// Managed model invocation. The underlying platform offers no
    /// resource-level scoping for this API, which is why it is the one
    /// permitted unscoped selector.
    pub const MODEL_INVOKE: &[&str] = &[
        "bedrock:InvokeModel",
        "bedrock:InvokeModelWithResponseStream",
    ];
}

/// The unscoped resource selector.
pub const ANY_RESOURCE: &str = "*";

/// A (principal, resource, action-set) permission tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub principal: Principal,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
    /// Set if and only if `resources` is the unscoped selector; explains
    /// why scoping is impossible. Never hidden from summaries.
    pub unscoped_justification: Option<String>,
}

impl Grant {
    /// A scoped grant.
    pub fn scoped(
        principal: Principal,
        actions: &[&str],
        resources: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            principal,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.into_iter().collect(),
            unscoped_justification: None,
        }
    }

    /// The one deliberate deviation from least privilege: an action space
    /// the platform cannot scope. Must carry its justification.
    pub fn unscoped(principal: Principal, actions: &[&str], justification: impl Into<String>) -> Self {
        Self {
            principal,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: vec![ANY_RESOURCE.to_string()],
            unscoped_justification: Some(justification.into()),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        self.resources.iter().any(|r| r == ANY_RESOURCE)
    }
}

impl std::fmt::Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> [{}] on [{}]",
            self.principal,
            self.actions.join(", "),
            self.resources.join(", ")
        )?;
        if let Some(reason) = &self.unscoped_justification {
            write!(f, " (UNSCOPED: {reason})")?;
        }
        Ok(())
    }
}
