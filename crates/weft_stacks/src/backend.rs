//! The backend topology: network, durable stores, compute unit, identity
//! provider and public API, with synthesized grants and every resource
//! identifier published through the parameter channel.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use weft_cloud::{
    boundary_spec, rest_api_spec, rule_pair, verify_paired, ComputeConfig, ComputeEnv,
    CorsConfig, IdentityConfig, KeyValueTableConfig, NetworkConfig, NetworkRule,
    ObjectStoreConfig, RelationalStoreConfig, DB_PORT,
};
use weft_graph::{
    Attr, DeploySummary, DeploymentState, DestroySummary, Engine, GraphError, Provisioner,
    RemovalPolicy, ResourceKind, ResourceSpec, TopologyGraph,
};
use weft_iam::{synthesize, verify, Grant, Principal, Wiring};
use weft_params::{keys, ParameterChannel};

use crate::config::DeployConfig;
use crate::error::{StackError, StackResult};

/// Topology name; also the state file stem.
pub const BACKEND_TOPOLOGY: &str = "assistant-backend";

/// Logical resource names within the backend topology.
pub mod names {
    pub const NETWORK: &str = "vpc";
    pub const DB_SECRET: &str = "agent-db-secret";
    pub const DB: &str = "agent-db";
    pub const DB_BOUNDARY: &str = "agent-db-sg";
    pub const PROCESSING_BOUNDARY: &str = "processing-sg";
    pub const COMPUTE_BOUNDARY: &str = "agent-executor-sg";
    pub const TABLE: &str = "chat-history";
    pub const BUCKET: &str = "agent-data";
    pub const COMPUTE: &str = "agent-executor";
    pub const USER_POOL: &str = "user-pool";
    pub const USER_POOL_CLIENT: &str = "user-pool-client";
    pub const API: &str = "assistant-api";
    pub const PROCESSING_POLICY: &str = "processing-db-access";
}

/// Channel parameters as graph nodes: (logical name, channel key).
///
/// Each is provisioned as a parameter resource whose value resolves from
/// another node's outputs; after deployment the resolved values are
/// copied into the parameter channel under the same keys.
const PARAMETER_NODES: &[(&str, &str)] = &[
    ("param-bedrock-region", keys::BEDROCK_REGION),
    ("param-llm-model-id", keys::LLM_MODEL_ID),
    ("param-chat-table", keys::CHAT_MESSAGE_HISTORY_TABLE),
    ("param-db-secret-arn", keys::DB_SECRET_ARN),
    ("param-subnet-ids", keys::SUBNET_IDS),
    ("param-processing-sg", keys::PROCESSING_SECURITY_GROUP_ID),
    ("param-agent-executor", keys::AGENT_EXECUTOR_NAME),
    ("param-data-bucket", keys::AGENT_DATA_BUCKET),
    ("param-user-pool-id", keys::COGNITO_USER_POOL_ID),
    ("param-user-pool-client-id", keys::COGNITO_USER_POOL_CLIENT_ID),
    ("param-agent-api", keys::AGENT_API),
];

/// Parameters an external processing job reads. The chat-history and
/// delivery-facing identity/API parameters are not among them; the job
/// never touches conversation state.
const PROCESSING_PARAM_NODES: &[&str] = &[
    "param-bedrock-region",
    "param-llm-model-id",
    "param-db-secret-arn",
    "param-subnet-ids",
    "param-processing-sg",
    "param-agent-executor",
    "param-data-bucket",
];

/// Key identifiers of a deployed backend.
#[derive(Debug, Clone)]
pub struct BackendOutputs {
    pub api_url: String,
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub table_name: String,
    pub bucket_name: String,
    pub compute_name: String,
    pub db_endpoint: String,
    pub db_secret_arn: String,
    pub processing_security_group_id: String,
    pub processing_policy_arn: String,
    pub grants: Vec<Grant>,
    pub summary: DeploySummary,
}

impl std::fmt::Display for BackendOutputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Backend topology deployed")?;
        writeln!(f, "  API base URL:        {}", self.api_url)?;
        writeln!(f, "  User pool id:        {}", self.user_pool_id)?;
        writeln!(f, "  User pool client id: {}", self.user_pool_client_id)?;
        writeln!(f, "  Chat history table:  {}", self.table_name)?;
        writeln!(f, "  Data bucket:         {}", self.bucket_name)?;
        writeln!(f, "  Compute unit:        {}", self.compute_name)?;
        writeln!(f, "  DB endpoint:         {}", self.db_endpoint)?;
        writeln!(f, "  Processing policy:   {}", self.processing_policy_arn)?;
        writeln!(f, "  Grants:")?;
        for grant in &self.grants {
            writeln!(f, "    {grant}")?;
        }
        Ok(())
    }
}

/// Planned backend graph plus the network rules it rests on.
pub struct BackendPlan {
    pub graph: TopologyGraph,
    pub rules: Vec<NetworkRule>,
}

/// Assembles and deploys the backend topology.
pub struct BackendTopology {
    config: DeployConfig,
}

impl BackendTopology {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Build the full resource graph. Nothing is provisioned here; an
    /// unsatisfiable network or a malformed graph fails before any
    /// resource exists.
    pub fn plan(&self) -> StackResult<BackendPlan> {
        let store_policy = if self.config.retain_data {
            RemovalPolicy::Retain
        } else {
            RemovalPolicy::Destroy
        };

        let mut graph = TopologyGraph::new();

        // Network first; everything else attaches to it.
        let network = NetworkConfig::default();
        graph.add(network.to_spec(names::NETWORK)?)?;

        // Paired rules: the store must be reachable from the compute
        // unit and from external processing jobs, both ways.
        let mut rules: Vec<NetworkRule> = Vec::new();
        rules.extend(rule_pair(names::DB_BOUNDARY, names::PROCESSING_BOUNDARY, DB_PORT));
        rules.extend(rule_pair(names::DB_BOUNDARY, names::COMPUTE_BOUNDARY, DB_PORT));
        verify_paired(&rules)?;

        for boundary in [
            names::DB_BOUNDARY,
            names::PROCESSING_BOUNDARY,
            names::COMPUTE_BOUNDARY,
        ] {
            graph.add(boundary_spec(boundary, names::NETWORK, &rules))?;
        }

        // Durable stores. One flag flips every store to durable.
        let relational = RelationalStoreConfig::default();
        graph.add(relational.secret_spec(names::DB_SECRET, store_policy))?;
        graph.add(relational.cluster_spec(
            names::DB,
            names::NETWORK,
            names::DB_SECRET,
            names::DB_BOUNDARY,
            store_policy,
        ))?;
        graph.add(KeyValueTableConfig::default().to_spec(names::TABLE, store_policy))?;
        graph.add(
            ObjectStoreConfig {
                auto_delete_objects: true,
            }
            .to_spec(names::BUCKET, store_policy),
        )?;

        // Identity provider binding.
        let identity = IdentityConfig::default();
        graph.add(identity.pool_spec(names::USER_POOL))?;
        graph.add(identity.client_spec(names::USER_POOL_CLIENT, names::USER_POOL))?;

        // Compute unit, wired by identifier only; the runtime resolves
        // secret values itself.
        let compute = ComputeConfig {
            image: format!("agent-executor:{}", self.config.environment),
            timeout: Duration::from_secs(300),
            memory_mb: 2048,
            env: ComputeEnv {
                bedrock_region_parameter: Attr::output("param-bedrock-region", "name"),
                llm_model_id_parameter: Attr::output("param-llm-model-id", "name"),
                chat_message_history_table: Attr::output(names::TABLE, "name"),
                agent_db_secret_id: Attr::output(names::DB_SECRET, "arn"),
                user_pool_id: Attr::output(names::USER_POOL, "id"),
                user_pool_client_id: Attr::output(names::USER_POOL_CLIENT, "id"),
            },
        };
        graph.add(
            compute
                .to_spec(names::COMPUTE, names::NETWORK, names::COMPUTE_BOUNDARY)
                .depends_on(names::DB),
        )?;

        // Public API: identity pool bound as authorizer in front of the
        // compute unit.
        graph.add(rest_api_spec(
            names::API,
            names::USER_POOL,
            names::COMPUTE,
            &CorsConfig::default(),
        ))?;

        // Channel parameters as first-class nodes.
        for (node, key) in PARAMETER_NODES {
            graph.add(
                ResourceSpec::new(*node, ResourceKind::Parameter)
                    .with_property("name", Attr::lit(*key))
                    .with_property("value", self.parameter_value(key)),
            )?;
        }

        // Managed policy attached to the external processing role.
        let mut policy_spec = ResourceSpec::new(names::PROCESSING_POLICY, ResourceKind::ManagedPolicy)
            .with_property(
                "parameter_arns",
                Attr::list(
                    PROCESSING_PARAM_NODES
                        .iter()
                        .map(|n| Attr::output(*n, "arn")),
                ),
            )
            .with_property("secret_arn", Attr::output(names::DB_SECRET, "arn"))
            .with_property("bucket_arn", Attr::output(names::BUCKET, "arn"))
            .with_property("function_arn", Attr::output(names::COMPUTE, "arn"));
        policy_spec = policy_spec.depends_on(names::DB);
        graph.add(policy_spec)?;

        graph.validate()?;
        Ok(BackendPlan { graph, rules })
    }

    /// Value each channel parameter resolves from.
    fn parameter_value(&self, key: &str) -> Attr {
        match key {
            keys::BEDROCK_REGION => Attr::lit(&self.config.region),
            keys::LLM_MODEL_ID => Attr::lit(&self.config.model_id),
            keys::CHAT_MESSAGE_HISTORY_TABLE => Attr::output(names::TABLE, "name"),
            keys::DB_SECRET_ARN => Attr::output(names::DB_SECRET, "arn"),
            keys::SUBNET_IDS => Attr::output(names::NETWORK, "egress_subnet_ids"),
            keys::PROCESSING_SECURITY_GROUP_ID => Attr::output(names::PROCESSING_BOUNDARY, "id"),
            keys::AGENT_EXECUTOR_NAME => Attr::output(names::COMPUTE, "name"),
            keys::AGENT_DATA_BUCKET => Attr::output(names::BUCKET, "name"),
            keys::COGNITO_USER_POOL_ID => Attr::output(names::USER_POOL, "id"),
            keys::COGNITO_USER_POOL_CLIENT_ID => Attr::output(names::USER_POOL_CLIENT, "id"),
            keys::AGENT_API => Attr::output(names::API, "url"),
            other => Attr::lit(other),
        }
    }

    /// Deploy the topology, publish every channel key, and return the
    /// identifier summary together with the synthesized grant list.
    pub async fn deploy(
        &self,
        provisioner: Arc<dyn Provisioner>,
        channel: &ParameterChannel,
    ) -> StackResult<BackendOutputs> {
        let plan = self.plan()?;
        let engine = Engine::new(provisioner, &self.config.state_dir);
        let (state, summary) = engine.deploy(BACKEND_TOPOLOGY, &plan.graph).await?;

        for (node, key) in PARAMETER_NODES {
            let value = required_output(&state, node, "value")?;
            channel.publish(key, value)?;
        }
        info!(
            topology = BACKEND_TOPOLOGY,
            parameters = PARAMETER_NODES.len(),
            "published channel parameters"
        );

        let grants = self.synthesize_grants(&state)?;

        Ok(BackendOutputs {
            api_url: required_output(&state, names::API, "url")?,
            user_pool_id: required_output(&state, names::USER_POOL, "id")?,
            user_pool_client_id: required_output(&state, names::USER_POOL_CLIENT, "id")?,
            table_name: required_output(&state, names::TABLE, "name")?,
            bucket_name: required_output(&state, names::BUCKET, "name")?,
            compute_name: required_output(&state, names::COMPUTE, "name")?,
            db_endpoint: required_output(&state, names::DB, "endpoint")?,
            db_secret_arn: required_output(&state, names::DB_SECRET, "arn")?,
            processing_security_group_id: required_output(&state, names::PROCESSING_BOUNDARY, "id")?,
            processing_policy_arn: required_output(&state, names::PROCESSING_POLICY, "arn")?,
            grants,
            summary,
        })
    }

    /// Tear the topology down in reverse dependency order and withdraw
    /// every channel key it published, so a later delivery deploy fails
    /// fast instead of wiring against resources that no longer exist.
    pub async fn destroy(
        &self,
        provisioner: Arc<dyn Provisioner>,
        channel: &ParameterChannel,
    ) -> StackResult<DestroySummary> {
        let plan = self.plan()?;
        let engine = Engine::new(provisioner, &self.config.state_dir);
        let summary = engine.destroy(BACKEND_TOPOLOGY, &plan.graph).await?;

        for (_, key) in PARAMETER_NODES {
            channel.unpublish(key)?;
        }
        info!(
            topology = BACKEND_TOPOLOGY,
            parameters = PARAMETER_NODES.len(),
            "withdrew channel parameters"
        );
        Ok(summary)
    }

    /// Least-privilege grants for the two principals this topology
    /// wires: the compute unit and the external processing job.
    fn synthesize_grants(&self, state: &DeploymentState) -> StackResult<Vec<Grant>> {
        let compute_wiring = Wiring::new(Principal::ComputeUnit(names::COMPUTE.to_string()))
            .reads_parameter(required_output(state, "param-bedrock-region", "arn")?)
            .reads_parameter(required_output(state, "param-llm-model-id", "arn")?)
            .reads_secret(required_output(state, names::DB_SECRET, "arn")?)
            .reads_writes_table(required_output(state, names::TABLE, "arn")?)
            .invokes_models();

        let mut processing_wiring =
            Wiring::new(Principal::ExternalJob("processing-job".to_string()))
                .reads_secret(required_output(state, names::DB_SECRET, "arn")?)
                .reads_writes_bucket(required_output(state, names::BUCKET, "arn")?)
                .invokes_function(required_output(state, names::COMPUTE, "arn")?);
        for node in PROCESSING_PARAM_NODES {
            processing_wiring =
                processing_wiring.reads_parameter(required_output(state, node, "arn")?);
        }

        let mut grants = Vec::new();
        for wiring in [&compute_wiring, &processing_wiring] {
            let synthesized = synthesize(wiring);
            verify(&synthesized, wiring)?;
            grants.extend(synthesized);
        }
        Ok(grants)
    }
}

/// Fetch a required output of a created resource from deployment state.
pub(crate) fn required_output(
    state: &DeploymentState,
    resource: &str,
    key: &str,
) -> StackResult<String> {
    state
        .outputs(resource)
        .and_then(|o| o.get(key))
        .map(str::to_string)
        .ok_or_else(|| {
            StackError::Graph(GraphError::MissingOutput {
                resource: resource.to_string(),
                output: key.to_string(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_every_component() {
        let topology = BackendTopology::new(DeployConfig::default());
        let plan = topology.plan().unwrap();

        for name in [
            names::NETWORK,
            names::DB,
            names::DB_SECRET,
            names::TABLE,
            names::BUCKET,
            names::COMPUTE,
            names::USER_POOL,
            names::USER_POOL_CLIENT,
            names::API,
            names::PROCESSING_POLICY,
        ] {
            assert!(plan.graph.get(name).is_some(), "missing resource {name}");
        }
        assert_eq!(plan.graph.len(), 10 + 3 + PARAMETER_NODES.len());
    }

    #[test]
    fn retain_data_flips_every_store() {
        let config = DeployConfig {
            retain_data: true,
            ..DeployConfig::default()
        };
        let plan = BackendTopology::new(config).plan().unwrap();

        for store in [names::DB, names::DB_SECRET, names::TABLE, names::BUCKET] {
            assert_eq!(
                plan.graph.get(store).unwrap().removal_policy,
                RemovalPolicy::Retain,
                "store {store} should be retained"
            );
        }
        // Stateless resources keep the default policy.
        assert_eq!(
            plan.graph.get(names::API).unwrap().removal_policy,
            RemovalPolicy::Destroy
        );
    }

    #[test]
    fn every_rule_in_the_plan_is_paired() {
        let plan = BackendTopology::new(DeployConfig::default()).plan().unwrap();
        verify_paired(&plan.rules).unwrap();
    }

    #[test]
    fn api_depends_on_identity_and_compute() {
        let plan = BackendTopology::new(DeployConfig::default()).plan().unwrap();
        let deps = plan.graph.get(names::API).unwrap().dependencies();
        assert!(deps.contains(names::USER_POOL));
        assert!(deps.contains(names::COMPUTE));
    }
}
