//! Least-privilege grant synthesis.
//!
//! A principal's wiring records exactly which resources its logic
//! touches; synthesis turns that wiring into the minimal grant list and
//! verification re-checks a grant list against the wiring afterwards.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IamError, IamResult};
use crate::grant::{actions, Grant, Principal, ANY_RESOURCE};

/// Justification attached to the one permitted unscoped grant.
pub const MODEL_INVOKE_JUSTIFICATION: &str =
    "managed model-invocation API offers no resource-level scoping";

/// Everything one principal was wired to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wiring {
    pub principal: Principal,
    /// ARNs of configuration parameters the principal reads.
    pub parameters_read: Vec<String>,
    /// ARNs of credential secrets the principal reads.
    pub secrets_read: Vec<String>,
    /// ARN of the session table, if the principal persists conversation
    /// state.
    pub table_read_write: Option<String>,
    /// ARN of the one bucket the principal reads and writes.
    pub bucket_read_write: Option<String>,
    /// ARNs of compute functions the principal invokes.
    pub functions_invoke: Vec<String>,
    /// Whether the principal calls the managed model-invocation API.
    pub model_invocation: bool,
}

impl Wiring {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            parameters_read: Vec::new(),
            secrets_read: Vec::new(),
            table_read_write: None,
            bucket_read_write: None,
            functions_invoke: Vec::new(),
            model_invocation: false,
        }
    }

    pub fn reads_parameter(mut self, arn: impl Into<String>) -> Self {
        self.parameters_read.push(arn.into());
        self
    }

    pub fn reads_secret(mut self, arn: impl Into<String>) -> Self {
        self.secrets_read.push(arn.into());
        self
    }

    pub fn reads_writes_table(mut self, arn: impl Into<String>) -> Self {
        self.table_read_write = Some(arn.into());
        self
    }

    pub fn reads_writes_bucket(mut self, arn: impl Into<String>) -> Self {
        self.bucket_read_write = Some(arn.into());
        self
    }

    pub fn invokes_function(mut self, arn: impl Into<String>) -> Self {
        self.functions_invoke.push(arn.into());
        self
    }

    pub fn invokes_models(mut self) -> Self {
        self.model_invocation = true;
        self
    }

    /// Every scoped resource identifier this wiring permits.
    fn whitelist(&self) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = BTreeSet::new();
        set.extend(self.parameters_read.iter().cloned());
        set.extend(self.secrets_read.iter().cloned());
        if let Some(table) = &self.table_read_write {
            set.insert(table.clone());
        }
        if let Some(bucket) = &self.bucket_read_write {
            set.insert(bucket.clone());
            set.insert(object_arn(bucket));
        }
        set.extend(self.functions_invoke.iter().cloned());
        set
    }
}

/// ARN covering every object under a bucket.
fn object_arn(bucket_arn: &str) -> String {
    format!("{bucket_arn}/*")
}

/// Synthesize the minimal grant list for one principal's wiring.
pub fn synthesize(wiring: &Wiring) -> Vec<Grant> {
    let mut grants = Vec::new();
    let principal = wiring.principal.clone();

    if !wiring.parameters_read.is_empty() {
        grants.push(Grant::scoped(
            principal.clone(),
            actions::PARAMETER_READ,
            wiring.parameters_read.iter().cloned(),
        ));
    }

    if !wiring.secrets_read.is_empty() {
        grants.push(Grant::scoped(
            principal.clone(),
            actions::SECRET_READ,
            wiring.secrets_read.iter().cloned(),
        ));
    }

    if let Some(table) = &wiring.table_read_write {
        grants.push(Grant::scoped(
            principal.clone(),
            actions::TABLE_READ_WRITE,
            [table.clone()],
        ));
    }

    if let Some(bucket) = &wiring.bucket_read_write {
        // Bucket ARN plus its object prefix, never all buckets.
        grants.push(Grant::scoped(
            principal.clone(),
            actions::BUCKET_READ_WRITE,
            [bucket.clone(), object_arn(bucket)],
        ));
    }

    if !wiring.functions_invoke.is_empty() {
        grants.push(Grant::scoped(
            principal.clone(),
            actions::FUNCTION_INVOKE,
            wiring.functions_invoke.iter().cloned(),
        ));
    }

    if wiring.model_invocation {
        grants.push(Grant::unscoped(
            principal,
            actions::MODEL_INVOKE,
            MODEL_INVOKE_JUSTIFICATION,
        ));
    }

    debug!(
        principal = %wiring.principal,
        grants = grants.len(),
        "synthesized grant list"
    );
    grants
}

/// Verify that a grant list stays inside its wiring.
///
/// Every scoped resource must appear in the wiring's whitelist; the only
/// unscoped selector permitted is the justified model-invocation grant,
/// and only when the wiring actually declares model invocation.
pub fn verify(grants: &[Grant], wiring: &Wiring) -> IamResult<()> {
    let whitelist = wiring.whitelist();

    for grant in grants {
        if grant.actions.is_empty() {
            return Err(IamError::EmptyGrant {
                principal: grant.principal.to_string(),
                what: "action".to_string(),
            });
        }
        if grant.resources.is_empty() {
            return Err(IamError::EmptyGrant {
                principal: grant.principal.to_string(),
                what: "resource".to_string(),
            });
        }

        for resource in &grant.resources {
            if resource == ANY_RESOURCE {
                let justified = grant.unscoped_justification.is_some()
                    && wiring.model_invocation
                    && grant
                        .actions
                        .iter()
                        .all(|a| actions::MODEL_INVOKE.contains(&a.as_str()));
                if !justified {
                    return Err(IamError::UnjustifiedWildcard {
                        principal: grant.principal.to_string(),
                        actions: grant.actions.clone(),
                    });
                }
            } else if !whitelist.contains(resource) {
                return Err(IamError::UnwiredResource {
                    principal: grant.principal.to_string(),
                    resource: resource.clone(),
                });
            }
        }
    }
    Ok(())
}
