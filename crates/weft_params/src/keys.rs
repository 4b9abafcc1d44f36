//! Channel key names.
//!
//! These are wire-exact: the backend topology publishes them and the
//! delivery topology (plus out-of-band processing jobs) reads them, so a
//! rename here breaks cross-topology compatibility.

/// Root namespace prefix of every channel key.
pub const NAMESPACE: &str = "/AgenticLLMAssistant";

/// Bedrock region the compute unit targets.
pub const BEDROCK_REGION: &str = "/AgenticLLMAssistant/bedrock_region";

/// Identifier of the model the compute unit invokes.
pub const LLM_MODEL_ID: &str = "/AgenticLLMAssistant/llm_model_id";

/// Name of the chat message history table.
pub const CHAT_MESSAGE_HISTORY_TABLE: &str = "/AgenticLLMAssistant/ChatMessageHistoryTableName";

/// ARN of the relational store's credential secret.
pub const DB_SECRET_ARN: &str = "/AgenticLLMAssistant/DBSecretARN";

/// JSON array of egress-capable subnet ids.
pub const SUBNET_IDS: &str = "/AgenticLLMAssistant/SubnetIds";

/// Security-group id used by external processing jobs.
pub const PROCESSING_SECURITY_GROUP_ID: &str =
    "/AgenticLLMAssistant/SMProcessingJobSecurityGroupId";

/// Name of the agent executor compute function.
pub const AGENT_EXECUTOR_NAME: &str = "/AgenticLLMAssistant/AgentExecutorLambdaNameParameter";

/// Name of the agent data bucket.
pub const AGENT_DATA_BUCKET: &str = "/AgenticLLMAssistant/AgentDataBucketParameter";

/// Identity pool id consumed by the delivery topology.
pub const COGNITO_USER_POOL_ID: &str = "/AgenticLLMAssistant/cognito_user_pool_id";

/// Identity client id consumed by the delivery topology.
pub const COGNITO_USER_POOL_CLIENT_ID: &str =
    "/AgenticLLMAssistant/cognito_user_pool_client_id";

/// Public base URL of the agent API.
pub const AGENT_API: &str = "/AgenticLLMAssistant/agent_api";

/// Keys that may be read with a documented default. Everything else must
/// fail fast when absent.
pub const OPTIONAL_KEYS: &[&str] = &[BEDROCK_REGION, LLM_MODEL_ID];

/// Whether a key may fall back to a default on read.
pub fn is_optional(key: &str) -> bool {
    OPTIONAL_KEYS.contains(&key)
}
