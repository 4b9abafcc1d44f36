//! End-to-end topology runs against the local provisioner: backend
//! deploy and redeploy, channel handoff to the delivery stack, partial
//! failure, and teardown with retained stores.

use std::sync::Arc;

use tempfile::TempDir;

use weft_cloud::LocalProvisioner;
use weft_graph::GraphError;
use weft_params::{keys, FileBackend, ParameterChannel};
use weft_stacks::{
    backend::names as backend_names, BackendTopology, DeliveryTopology, DeployConfig, StackError,
    BACKEND_TOPOLOGY, DELIVERY_TOPOLOGY,
};

fn config_in(dir: &TempDir) -> DeployConfig {
    DeployConfig {
        state_dir: dir.path().to_path_buf(),
        ..DeployConfig::default()
    }
}

fn channel_in(dir: &TempDir, topology: &str) -> ParameterChannel {
    ParameterChannel::new(Arc::new(FileBackend::new(dir.path())), topology)
}

#[tokio::test]
async fn backend_deploy_publishes_every_channel_key() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new(&config.region));

    let outputs = BackendTopology::new(config)
        .deploy(provisioner, &channel)
        .await
        .unwrap();

    for key in [
        keys::BEDROCK_REGION,
        keys::LLM_MODEL_ID,
        keys::CHAT_MESSAGE_HISTORY_TABLE,
        keys::DB_SECRET_ARN,
        keys::SUBNET_IDS,
        keys::PROCESSING_SECURITY_GROUP_ID,
        keys::AGENT_EXECUTOR_NAME,
        keys::AGENT_DATA_BUCKET,
        keys::COGNITO_USER_POOL_ID,
        keys::COGNITO_USER_POOL_CLIENT_ID,
        keys::AGENT_API,
    ] {
        assert!(channel.read(key).is_ok(), "channel key {key} not published");
    }

    assert_eq!(channel.read(keys::BEDROCK_REGION).unwrap(), "eu-central-1");
    assert_eq!(channel.read(keys::AGENT_API).unwrap(), outputs.api_url);
    assert!(outputs.api_url.starts_with("https://"));

    // Subnet identifiers arrive as a JSON array of private subnets.
    let subnets: Vec<String> =
        serde_json::from_str(&channel.read(keys::SUBNET_IDS).unwrap()).unwrap();
    assert_eq!(subnets.len(), 2);
}

#[tokio::test]
async fn backend_grants_are_scoped_except_model_invocation() {
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new("eu-central-1"));

    let outputs = BackendTopology::new(config_in(&dir))
        .deploy(provisioner, &channel)
        .await
        .unwrap();

    let unscoped: Vec<_> = outputs.grants.iter().filter(|g| g.is_unscoped()).collect();
    assert_eq!(unscoped.len(), 1);
    assert!(unscoped[0]
        .actions
        .iter()
        .all(|a| a.starts_with("bedrock:")));
    assert!(unscoped[0].unscoped_justification.is_some());
}

#[tokio::test]
async fn stores_are_created_before_dependents() {
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new("eu-central-1"));

    BackendTopology::new(config_in(&dir))
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();

    let order: Vec<String> = provisioner.created().into_iter().map(|c| c.name).collect();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

    assert!(pos(backend_names::NETWORK) < pos(backend_names::DB_BOUNDARY));
    assert!(pos(backend_names::DB_SECRET) < pos(backend_names::DB));
    assert!(pos(backend_names::DB) < pos(backend_names::COMPUTE));
    assert!(pos(backend_names::COMPUTE) < pos(backend_names::API));
    assert!(pos(backend_names::API) < pos("param-agent-api"));
}

#[tokio::test]
async fn redeploy_without_changes_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);

    let first = Arc::new(LocalProvisioner::new(&config.region));
    BackendTopology::new(config.clone())
        .deploy(Arc::clone(&first) as _, &channel)
        .await
        .unwrap();
    let created_first = first.created().len();
    assert!(created_first > 0);

    let second = Arc::new(LocalProvisioner::new(&config.region));
    let outputs = BackendTopology::new(config)
        .deploy(Arc::clone(&second) as _, &channel)
        .await
        .unwrap();

    assert!(second.created().is_empty(), "redeploy recreated resources");
    assert!(outputs.summary.created.is_empty());
    assert_eq!(outputs.summary.unchanged.len(), created_first);
}

#[tokio::test]
async fn changing_model_id_replaces_only_its_parameter() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);

    BackendTopology::new(config.clone())
        .deploy(Arc::new(LocalProvisioner::new(&config.region)), &channel)
        .await
        .unwrap();

    let changed = DeployConfig {
        model_id: "anthropic.claude-3-sonnet".to_string(),
        ..config
    };
    let outputs = BackendTopology::new(changed)
        .deploy(Arc::new(LocalProvisioner::new("eu-central-1")), &channel)
        .await
        .unwrap();

    assert_eq!(outputs.summary.replaced, vec!["param-llm-model-id"]);
    assert_eq!(
        channel.read(keys::LLM_MODEL_ID).unwrap(),
        "anthropic.claude-3-sonnet"
    );
}

#[tokio::test]
async fn failed_resource_is_named_and_earlier_waves_survive() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(
        LocalProvisioner::new(&config.region).fail_on(backend_names::DB),
    );

    let err = BackendTopology::new(config.clone())
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap_err();

    match err {
        StackError::Graph(GraphError::ProvisioningFailed { resource, .. }) => {
            assert_eq!(resource, backend_names::DB)
        }
        other => panic!("unexpected error: {other}"),
    }

    // Resources from earlier waves were created and stay recorded.
    let created: Vec<String> = provisioner.created().into_iter().map(|c| c.name).collect();
    assert!(created.contains(&backend_names::NETWORK.to_string()));
    assert!(!created.contains(&backend_names::COMPUTE.to_string()));

    // A repaired run picks up where the failure left off.
    let retry = Arc::new(LocalProvisioner::new(&config.region));
    let outputs = BackendTopology::new(config)
        .deploy(Arc::clone(&retry) as _, &channel)
        .await
        .unwrap();
    assert!(outputs
        .summary
        .unchanged
        .contains(&backend_names::NETWORK.to_string()));
    assert!(outputs
        .summary
        .created
        .contains(&backend_names::DB.to_string()));
}

#[tokio::test]
async fn delivery_consumes_backend_parameters() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let backend_channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let backend = BackendTopology::new(config.clone())
        .deploy(Arc::new(LocalProvisioner::new(&config.region)), &backend_channel)
        .await
        .unwrap();

    let delivery_channel = channel_in(&dir, DELIVERY_TOPOLOGY);
    let delivery = DeliveryTopology::new(config.clone())
        .deploy(Arc::new(LocalProvisioner::new(&config.region)), &delivery_channel)
        .await
        .unwrap();

    assert!(delivery.app_url.contains(".amplifyapp.com"));
    assert_ne!(delivery.app_url, backend.api_url);
}

#[tokio::test]
async fn delivery_without_backend_fails_before_provisioning() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, DELIVERY_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new(&config.region));

    let result = DeliveryTopology::new(config)
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await;

    assert!(matches!(result, Err(StackError::Param(_))));
    assert!(provisioner.created().is_empty());
}

#[tokio::test]
async fn destroyed_backend_no_longer_feeds_the_channel() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new(&config.region));

    let topology = BackendTopology::new(config.clone());
    topology
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();
    topology
        .destroy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();

    // Every published key is withdrawn with its backing resources.
    assert!(matches!(
        channel.read(keys::AGENT_API),
        Err(weft_params::ParamError::MissingParameter(_))
    ));
    assert!(channel.entries().unwrap().is_empty());

    // A delivery deploy against the torn-down backend fails fast
    // instead of wiring the UI to resources that no longer exist.
    let delivery_channel = channel_in(&dir, DELIVERY_TOPOLOGY);
    let result = DeliveryTopology::new(config)
        .deploy(Arc::new(LocalProvisioner::new("eu-central-1")), &delivery_channel)
        .await;
    assert!(matches!(result, Err(StackError::Param(_))));
}

#[tokio::test]
async fn processing_job_is_not_granted_the_chat_history_parameter() {
    let dir = TempDir::new().unwrap();
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);

    let outputs = BackendTopology::new(config_in(&dir))
        .deploy(Arc::new(LocalProvisioner::new("eu-central-1")), &channel)
        .await
        .unwrap();

    let job_resources: Vec<&str> = outputs
        .grants
        .iter()
        .filter(|g| g.principal.to_string().starts_with("job:"))
        .flat_map(|g| g.resources.iter().map(String::as_str))
        .collect();
    assert!(!job_resources.is_empty());
    assert!(job_resources
        .iter()
        .all(|r| !r.contains("ChatMessageHistoryTableName")));
    // The job's remaining parameter reads stay intact.
    assert!(job_resources
        .iter()
        .any(|r| r.contains("AgentDataBucketParameter")));
}

#[tokio::test]
async fn destroy_with_retain_data_keeps_every_store() {
    let dir = TempDir::new().unwrap();
    let config = DeployConfig {
        retain_data: true,
        ..config_in(&dir)
    };
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new(&config.region));

    let topology = BackendTopology::new(config);
    topology
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();
    let summary = topology
        .destroy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();

    for store in [
        backend_names::DB,
        backend_names::DB_SECRET,
        backend_names::TABLE,
        backend_names::BUCKET,
    ] {
        assert!(
            summary.retained.contains(&store.to_string()),
            "store {store} was not retained"
        );
        assert!(!provisioner.deleted().contains(&store.to_string()));
    }
    assert!(summary.deleted.contains(&backend_names::API.to_string()));
}

#[tokio::test]
async fn destroy_without_retention_removes_everything() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let channel = channel_in(&dir, BACKEND_TOPOLOGY);
    let provisioner = Arc::new(LocalProvisioner::new(&config.region));

    let topology = BackendTopology::new(config);
    topology
        .deploy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();
    let created = provisioner.created().len();

    let summary = topology
        .destroy(Arc::clone(&provisioner) as _, &channel)
        .await
        .unwrap();

    assert!(summary.retained.is_empty());
    assert_eq!(summary.deleted.len(), created);
    assert_eq!(provisioner.deleted().len(), created);
}
