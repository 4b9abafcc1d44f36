//! Simulated provisioner.
//!
//! Synthesizes deterministic-shaped identifiers (ARNs, names, endpoints)
//! per resource kind without touching any platform. The CLI and the
//! integration tests run against it; a platform-backed provisioner slots
//! in behind the same trait.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use weft_graph::{
    GraphError, GraphResult, Provisioner, ResolvedProperties, ResourceKind, ResourceOutputs,
    ResourceRecord, ResourceSpec,
};

/// A captured create call, for assertions.
#[derive(Debug, Clone)]
pub struct CapturedCreate {
    pub name: String,
    pub kind: ResourceKind,
}

/// Provisioner that fabricates plausible identifiers per kind.
pub struct LocalProvisioner {
    region: String,
    account: String,
    creates: RwLock<Vec<CapturedCreate>>,
    deletes: RwLock<Vec<String>>,
    fail_on: RwLock<Option<String>>,
}

impl LocalProvisioner {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: "123456789012".to_string(),
            creates: RwLock::new(Vec::new()),
            deletes: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    /// Fail the next create of the named resource, to exercise partial
    /// failure handling.
    pub fn fail_on(self, name: impl Into<String>) -> Self {
        *self.fail_on.write() = Some(name.into());
        self
    }

    pub fn created(&self) -> Vec<CapturedCreate> {
        self.creates.read().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.read().clone()
    }

    fn suffix() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    fn synthesize(&self, spec: &ResourceSpec, properties: &ResolvedProperties) -> ResourceOutputs {
        let region = &self.region;
        let account = &self.account;
        let name = &spec.name;
        let sfx = Self::suffix();

        match spec.kind {
            ResourceKind::Network => {
                let max_azs: usize = properties
                    .get("max_azs")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2);
                let azs: Vec<String> = (0..max_azs)
                    .map(|i| format!("{region}{}", (b'a' + i as u8) as char))
                    .collect();
                let ids = |tag: &str| -> String {
                    let list: Vec<String> = azs
                        .iter()
                        .map(|az| format!("subnet-{tag}-{az}-{sfx}"))
                        .collect();
                    serde_json::to_string(&list).unwrap_or_default()
                };
                ResourceOutputs::new()
                    .with("id", format!("vpc-{sfx}"))
                    .with("public_subnet_ids", ids("pub"))
                    .with("egress_subnet_ids", ids("egr"))
                    .with("isolated_subnet_ids", ids("iso"))
            }
            ResourceKind::SecurityBoundary => ResourceOutputs::new()
                .with("id", format!("sg-{sfx}"))
                .with("name", name.clone()),
            ResourceKind::RelationalStore => ResourceOutputs::new()
                .with(
                    "arn",
                    format!("arn:aws:rds:{region}:{account}:cluster:{name}-{sfx}"),
                )
                .with("name", format!("{name}-{sfx}"))
                .with(
                    "endpoint",
                    format!("{name}-{sfx}.cluster-{region}.rds.amazonaws.com"),
                ),
            ResourceKind::Secret => ResourceOutputs::new()
                .with(
                    "arn",
                    format!("arn:aws:secretsmanager:{region}:{account}:secret:{name}-{sfx}"),
                )
                .with("name", format!("{name}-{sfx}")),
            ResourceKind::KeyValueTable => {
                let physical = format!("{name}-{sfx}");
                ResourceOutputs::new()
                    .with(
                        "arn",
                        format!("arn:aws:dynamodb:{region}:{account}:table/{physical}"),
                    )
                    .with("name", physical)
            }
            ResourceKind::ObjectStore => {
                let physical = format!("{name}-{sfx}").to_lowercase();
                ResourceOutputs::new()
                    .with("arn", format!("arn:aws:s3:::{physical}"))
                    .with("name", physical)
            }
            ResourceKind::ComputeFunction => {
                let physical = format!("{name}-{sfx}");
                ResourceOutputs::new()
                    .with(
                        "arn",
                        format!("arn:aws:lambda:{region}:{account}:function:{physical}"),
                    )
                    .with("name", physical)
            }
            ResourceKind::UserPool => {
                let id = format!("{region}_{sfx}");
                ResourceOutputs::new()
                    .with(
                        "arn",
                        format!("arn:aws:cognito-idp:{region}:{account}:userpool/{id}"),
                    )
                    .with("id", id)
                    .with("name", name.clone())
            }
            ResourceKind::UserPoolClient => ResourceOutputs::new()
                .with("id", format!("client{sfx}"))
                .with("name", name.clone()),
            ResourceKind::RestApi => {
                let id = format!("api{sfx}");
                ResourceOutputs::new()
                    .with("id", id.clone())
                    .with(
                        "url",
                        format!("https://{id}.execute-api.{region}.amazonaws.com/prod/"),
                    )
            }
            ResourceKind::Parameter => {
                let path = properties.get("name").unwrap_or(name.as_str()).to_string();
                ResourceOutputs::new()
                    .with("arn", format!("arn:aws:ssm:{region}:{account}:parameter{path}"))
                    .with("name", path)
                    .with("value", properties.get("value").unwrap_or_default())
            }
            ResourceKind::ManagedPolicy => ResourceOutputs::new()
                .with("arn", format!("arn:aws:iam::{account}:policy/{name}-{sfx}"))
                .with("name", format!("{name}-{sfx}")),
            ResourceKind::Repository => {
                let physical = format!("{name}-{sfx}");
                ResourceOutputs::new()
                    .with(
                        "clone_url",
                        format!("https://git.{region}.amazonaws.com/v1/repos/{physical}"),
                    )
                    .with("name", physical)
            }
            ResourceKind::WebApp => {
                let id = format!("d{sfx}");
                ResourceOutputs::new()
                    .with("id", id.clone())
                    .with("url", format!("https://main.{id}.amplifyapp.com"))
                    .with("name", name.clone())
            }
        }
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn create(
        &self,
        spec: &ResourceSpec,
        properties: &ResolvedProperties,
    ) -> GraphResult<ResourceOutputs> {
        if self.fail_on.read().as_deref() == Some(spec.name.as_str()) {
            return Err(GraphError::Provider(format!(
                "simulated platform rejection of '{}'",
                spec.name
            )));
        }
        self.creates.write().push(CapturedCreate {
            name: spec.name.clone(),
            kind: spec.kind,
        });
        Ok(self.synthesize(spec, properties))
    }

    async fn delete(&self, record: &ResourceRecord) -> GraphResult<()> {
        self.deletes.write().push(record.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_graph::Attr;

    #[tokio::test]
    async fn network_outputs_cover_every_subnet_kind() {
        let provisioner = LocalProvisioner::new("eu-central-1");
        let spec = ResourceSpec::new("vpc", ResourceKind::Network)
            .with_property("max_azs", Attr::lit("2"));
        let properties = spec
            .resolve_properties(&std::collections::HashMap::new())
            .unwrap();

        let outputs = provisioner.create(&spec, &properties).await.unwrap();

        assert!(outputs.get("id").unwrap().starts_with("vpc-"));
        let isolated: Vec<String> =
            serde_json::from_str(outputs.get("isolated_subnet_ids").unwrap()).unwrap();
        assert_eq!(isolated.len(), 2);
        assert!(isolated[0].starts_with("subnet-iso-eu-central-1a"));
    }

    #[tokio::test]
    async fn bucket_names_are_lowercased() {
        let provisioner = LocalProvisioner::new("eu-central-1");
        let spec = ResourceSpec::new("AgentDataBucket", ResourceKind::ObjectStore);
        let properties = ResolvedProperties::default();

        let outputs = provisioner.create(&spec, &properties).await.unwrap();
        let name = outputs.name().unwrap();
        assert_eq!(name, name.to_lowercase());
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_provider_error() {
        let provisioner = LocalProvisioner::new("eu-central-1").fail_on("agent-db");
        let spec = ResourceSpec::new("agent-db", ResourceKind::RelationalStore);

        let err = provisioner
            .create(&spec, &ResolvedProperties::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Provider(_)));
        assert!(provisioner.created().is_empty());
    }
}
