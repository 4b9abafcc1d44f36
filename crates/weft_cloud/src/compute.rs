//! The compute unit: container image, fixed environment wiring,
//! invocation contract and limits.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use weft_graph::{Attr, ResourceKind, ResourceSpec};

use crate::network::SubnetKind;

/// Environment variable names the compute runtime reads.
///
/// Wire-exact: the runtime resolves its configuration through these.
pub mod env {
    pub const BEDROCK_REGION_PARAMETER: &str = "BEDROCK_REGION_PARAMETER";
    pub const LLM_MODEL_ID_PARAMETER: &str = "LLM_MODEL_ID_PARAMETER";
    pub const CHAT_MESSAGE_HISTORY_TABLE: &str = "CHAT_MESSAGE_HISTORY_TABLE";
    pub const AGENT_DB_SECRET_ID: &str = "AGENT_DB_SECRET_ID";
    pub const COGNITO_USER_POOL_ID: &str = "COGNITO_USER_POOL_ID";
    pub const COGNITO_USER_POOL_CLIENT_ID: &str = "COGNITO_USER_POOL_CLIENT_ID";
}

/// The fixed environment map handed to the compute unit.
///
/// Only identifiers travel here: the runtime resolves secret values
/// itself at execution time, so no secret value ever appears in a spec.
#[derive(Debug, Clone)]
pub struct ComputeEnv {
    pub bedrock_region_parameter: Attr,
    pub llm_model_id_parameter: Attr,
    pub chat_message_history_table: Attr,
    pub agent_db_secret_id: Attr,
    pub user_pool_id: Attr,
    pub user_pool_client_id: Attr,
}

impl ComputeEnv {
    fn entries(&self) -> [(&'static str, &Attr); 6] {
        [
            (env::BEDROCK_REGION_PARAMETER, &self.bedrock_region_parameter),
            (env::LLM_MODEL_ID_PARAMETER, &self.llm_model_id_parameter),
            (
                env::CHAT_MESSAGE_HISTORY_TABLE,
                &self.chat_message_history_table,
            ),
            (env::AGENT_DB_SECRET_ID, &self.agent_db_secret_id),
            (env::COGNITO_USER_POOL_ID, &self.user_pool_id),
            (env::COGNITO_USER_POOL_CLIENT_ID, &self.user_pool_client_id),
        ]
    }
}

/// Compute unit configuration.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// Container image reference.
    pub image: String,
    /// Upper bound on a single invocation.
    pub timeout: Duration,
    /// Memory limit in MiB.
    pub memory_mb: u32,
    pub env: ComputeEnv,
}

impl ComputeConfig {
    /// Build the compute resource spec, placed in egress-capable subnets
    /// so the unit can reach external model-serving APIs.
    pub fn to_spec(&self, name: &str, network: &str, boundary: &str) -> ResourceSpec {
        let mut spec = ResourceSpec::new(name, ResourceKind::ComputeFunction)
            .with_property("image", Attr::lit(&self.image))
            .with_property("timeout_secs", Attr::lit(self.timeout.as_secs().to_string()))
            .with_property("memory_mb", Attr::lit(self.memory_mb.to_string()))
            .with_property(
                "subnet_ids",
                Attr::output(network, SubnetKind::PrivateWithEgress.output_key()),
            )
            .with_property("security_boundary", Attr::output(boundary, "id"));
        for (key, attr) in self.env.entries() {
            spec = spec.with_property(format!("env.{key}"), attr.clone());
        }
        spec
    }
}

/// Request envelope the public API forwards to the compute unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub user_input: String,
    pub session_id: String,
    #[serde(default)]
    pub clean_history: bool,
    /// Caller identity claims attached by the gateway after
    /// authorization.
    #[serde(default)]
    pub auth_claims: BTreeMap<String, String>,
}

/// Response envelope produced by the compute unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationOutcome {
    Success {
        response: String,
    },
    Failure {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Errors surfaced by an invocation.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Invocation exceeded the configured timeout of {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Invocation failed: {0}")]
    Failed(String),
}

/// Invokes the deployed compute unit. Live request handling goes through
/// this seam; the assembler itself never calls it.
#[async_trait]
pub trait ComputeInvoker: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationOutcome, InvocationError>;
}

/// Invoke with the configured time limit.
///
/// An invocation that exceeds the limit surfaces as a timeout error to
/// the caller; it is deliberately not retried here, since duplicate side
/// effects on non-idempotent agent actions are worse than a surfaced
/// timeout.
pub async fn invoke_with_limit(
    invoker: &dyn ComputeInvoker,
    request: &InvocationRequest,
    timeout: Duration,
) -> Result<InvocationOutcome, InvocationError> {
    match tokio::time::timeout(timeout, invoker.invoke(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                session_id = %request.session_id,
                timeout_secs = timeout.as_secs(),
                "compute invocation timed out"
            );
            Err(InvocationError::Timeout {
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}
