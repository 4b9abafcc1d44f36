//! Dependency-ordered deployment engine.
//!
//! The engine is a single-pass builder: it validates the graph, computes
//! the delta against persisted state, then creates resources wave by wave.
//! Resources within a wave are independent and created concurrently;
//! state is persisted after every wave. A failure stops the build and
//! leaves every already-created resource in place (no automatic rollback).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{GraphError, GraphResult};
use crate::graph::TopologyGraph;
use crate::node::{RemovalPolicy, ResolvedProperties, ResourceOutputs, ResourceSpec};
use crate::state::{DeploymentState, ResourceRecord};

/// Creates and deletes individual resources against some platform.
///
/// Implementations must be safe to call concurrently for independent
/// resources within a wave.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create a resource from its spec and resolved properties, returning
    /// its identifying outputs.
    async fn create(
        &self,
        spec: &ResourceSpec,
        properties: &ResolvedProperties,
    ) -> GraphResult<ResourceOutputs>;

    /// Delete a previously created resource.
    async fn delete(&self, record: &ResourceRecord) -> GraphResult<()>;
}

/// Outcome of a deployment run.
#[derive(Debug, Clone, Default)]
pub struct DeploySummary {
    pub created: Vec<String>,
    pub unchanged: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
}

/// Outcome of a teardown run.
#[derive(Debug, Clone, Default)]
pub struct DestroySummary {
    pub deleted: Vec<String>,
    pub retained: Vec<String>,
}

/// Deployment engine bound to a provisioner and a state directory.
pub struct Engine {
    provisioner: Arc<dyn Provisioner>,
    state_dir: PathBuf,
}

impl Engine {
    pub fn new(provisioner: Arc<dyn Provisioner>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            provisioner,
            state_dir: state_dir.into(),
        }
    }

    /// Deploy a topology graph, converging the persisted state onto it.
    ///
    /// Re-running against an unchanged graph creates nothing: every
    /// resource whose fingerprint matches its record is reused as-is.
    pub async fn deploy(
        &self,
        topology: &str,
        graph: &TopologyGraph,
    ) -> GraphResult<(DeploymentState, DeploySummary)> {
        graph.validate()?;
        let waves = graph.build_order()?;

        let mut state = DeploymentState::load_or_new(&self.state_dir, topology)?;
        let mut summary = DeploySummary::default();

        self.remove_orphans(graph, &mut state, &mut summary).await?;

        info!(
            topology,
            resources = graph.len(),
            waves = waves.len(),
            "starting deployment"
        );

        let mut outputs: HashMap<String, ResourceOutputs> = HashMap::new();

        for (wave_index, wave) in waves.iter().enumerate() {
            let mut tasks: JoinSet<(String, GraphResult<ResourceOutputs>)> = JoinSet::new();
            let mut wave_created: Vec<(String, String)> = Vec::new();

            for name in wave {
                let spec = graph
                    .get(name)
                    .ok_or_else(|| GraphError::InvalidState(format!("unknown resource {name}")))?;
                let resolved = spec.resolve_properties(&outputs)?;
                let fingerprint = fingerprint(spec, &resolved);

                if let Some(record) = state.resources.get_mut(name) {
                    if record.fingerprint == fingerprint {
                        // Policy flips alone never recreate a resource.
                        record.removal_policy = spec.removal_policy;
                        debug!(resource = %name, "unchanged, reusing outputs");
                        outputs.insert(name.clone(), record.outputs.clone());
                        summary.unchanged.push(name.clone());
                        continue;
                    }
                }
                if let Some(old) = state.resources.remove(name) {
                    self.replace_old(&old).await?;
                    summary.replaced.push(name.clone());
                }

                wave_created.push((name.clone(), fingerprint.clone()));

                let provisioner = Arc::clone(&self.provisioner);
                let spec = spec.clone();
                tasks.spawn(async move {
                    let result = provisioner.create(&spec, &resolved).await;
                    (spec.name, result)
                });
            }

            let mut failure: Option<GraphError> = None;
            while let Some(joined) = tasks.join_next().await {
                let (name, result) = joined
                    .map_err(|e| GraphError::InvalidState(format!("provisioning task: {e}")))?;
                match result {
                    Ok(res_outputs) => {
                        let spec = graph.get(&name).ok_or_else(|| {
                            GraphError::InvalidState(format!("unknown resource {name}"))
                        })?;
                        let fingerprint = wave_created
                            .iter()
                            .find(|(n, _)| n == &name)
                            .map(|(_, f)| f.clone())
                            .unwrap_or_default();
                        info!(resource = %name, kind = %spec.kind, "created");
                        outputs.insert(name.clone(), res_outputs.clone());
                        state.resources.insert(
                            name.clone(),
                            ResourceRecord {
                                name: name.clone(),
                                kind: spec.kind,
                                removal_policy: spec.removal_policy,
                                fingerprint,
                                outputs: res_outputs,
                                created_at: Utc::now(),
                            },
                        );
                        if !summary.replaced.contains(&name) {
                            summary.created.push(name);
                        }
                    }
                    Err(e) => {
                        error!(resource = %name, error = %e, "provisioning failed");
                        if failure.is_none() {
                            failure = Some(GraphError::ProvisioningFailed {
                                resource: name,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }

            // Persist whatever this wave managed to create, success or not.
            state.save(&self.state_dir)?;

            if let Some(err) = failure {
                warn!(
                    topology,
                    wave = wave_index,
                    "deployment stopped; created resources are left in place"
                );
                return Err(err);
            }
        }

        summary.created.sort();
        summary.unchanged.sort();
        info!(
            topology,
            created = summary.created.len(),
            unchanged = summary.unchanged.len(),
            "deployment complete"
        );
        Ok((state, summary))
    }

    /// Tear down a topology in reverse dependency order.
    ///
    /// `Retain` resources are left in place and reported; `Destroy`
    /// resources are deleted. The state file is removed afterwards.
    pub async fn destroy(
        &self,
        topology: &str,
        graph: &TopologyGraph,
    ) -> GraphResult<DestroySummary> {
        let state = DeploymentState::load_or_new(&self.state_dir, topology)?;
        let mut summary = DestroySummary::default();

        let mut order: Vec<String> = graph
            .build_order()?
            .into_iter()
            .flatten()
            .collect();
        order.reverse();
        // Orphaned records (no longer in the graph) go first.
        let orphans: Vec<String> = state
            .resources
            .keys()
            .filter(|n| graph.get(n).is_none())
            .cloned()
            .collect();

        for name in orphans.into_iter().chain(order) {
            let Some(record) = state.resources.get(&name) else {
                continue;
            };
            match record.removal_policy {
                RemovalPolicy::Destroy => {
                    self.provisioner.delete(record).await.map_err(|e| {
                        GraphError::ProvisioningFailed {
                            resource: name.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    info!(resource = %name, "deleted");
                    summary.deleted.push(name);
                }
                RemovalPolicy::Retain => {
                    warn!(resource = %name, "retained; not deleting");
                    summary.retained.push(name);
                }
            }
        }

        DeploymentState::remove_file(&self.state_dir, topology)?;
        Ok(summary)
    }

    async fn remove_orphans(
        &self,
        graph: &TopologyGraph,
        state: &mut DeploymentState,
        summary: &mut DeploySummary,
    ) -> GraphResult<()> {
        let orphans: Vec<String> = state
            .resources
            .keys()
            .filter(|n| graph.get(n).is_none())
            .cloned()
            .collect();

        for name in orphans {
            let Some(record) = state.resources.remove(&name) else {
                continue;
            };
            match record.removal_policy {
                RemovalPolicy::Destroy => {
                    self.provisioner.delete(&record).await.map_err(|e| {
                        GraphError::ProvisioningFailed {
                            resource: name.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    info!(resource = %name, "removed orphaned resource");
                }
                RemovalPolicy::Retain => {
                    warn!(resource = %name, "orphaned but retained; left in place");
                }
            }
            summary.removed.push(name);
        }
        Ok(())
    }

    async fn replace_old(&self, old: &ResourceRecord) -> GraphResult<()> {
        match old.removal_policy {
            RemovalPolicy::Destroy => self.provisioner.delete(old).await.map_err(|e| {
                GraphError::ProvisioningFailed {
                    resource: old.name.clone(),
                    reason: e.to_string(),
                }
            }),
            RemovalPolicy::Retain => {
                warn!(resource = %old.name, "spec changed; old resource retained");
                Ok(())
            }
        }
    }
}

/// Fingerprint of a spec and its resolved property values.
///
/// Removal policy is deliberately excluded so that flipping the policy
/// does not recreate stateful resources.
fn fingerprint(spec: &ResourceSpec, resolved: &ResolvedProperties) -> String {
    json!({
        "kind": spec.kind,
        "properties": resolved.values,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Attr, ResourceKind};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    /// Captures create/delete calls and can fail a named resource.
    struct StubProvisioner {
        creates: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl StubProvisioner {
        fn new() -> Self {
            Self {
                creates: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Provisioner for StubProvisioner {
        async fn create(
            &self,
            spec: &ResourceSpec,
            _properties: &ResolvedProperties,
        ) -> GraphResult<ResourceOutputs> {
            if self.fail_on.as_deref() == Some(spec.name.as_str()) {
                return Err(GraphError::Provider("platform rejected resource".into()));
            }
            self.creates.lock().push(spec.name.clone());
            Ok(ResourceOutputs::new()
                .with("name", format!("{}-physical", spec.name))
                .with("arn", format!("arn:test:{}", spec.name)))
        }

        async fn delete(&self, record: &ResourceRecord) -> GraphResult<()> {
            self.deletes.lock().push(record.name.clone());
            Ok(())
        }
    }

    fn sample_graph() -> TopologyGraph {
        let mut graph = TopologyGraph::new();
        graph
            .add(ResourceSpec::new("vpc", ResourceKind::Network))
            .unwrap();
        graph
            .add(ResourceSpec::new("db", ResourceKind::RelationalStore).depends_on("vpc"))
            .unwrap();
        graph
            .add(
                ResourceSpec::new("compute", ResourceKind::ComputeFunction)
                    .with_property("db_arn", Attr::output("db", "arn")),
            )
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn deploys_in_dependency_order() {
        let dir = tempdir().unwrap();
        let provisioner = Arc::new(StubProvisioner::new());
        let engine = Engine::new(provisioner.clone(), dir.path());

        let (state, summary) = engine.deploy("backend", &sample_graph()).await.unwrap();

        assert_eq!(summary.created.len(), 3);
        assert_eq!(state.resources.len(), 3);

        let creates = provisioner.creates.lock();
        let pos = |n: &str| creates.iter().position(|c| c == n).unwrap();
        assert!(pos("vpc") < pos("db"));
        assert!(pos("db") < pos("compute"));
    }

    #[tokio::test]
    async fn redeploy_of_unchanged_graph_creates_nothing() {
        let dir = tempdir().unwrap();
        let provisioner = Arc::new(StubProvisioner::new());
        let engine = Engine::new(provisioner.clone(), dir.path());
        let graph = sample_graph();

        engine.deploy("backend", &graph).await.unwrap();
        let first_count = provisioner.creates.lock().len();

        let (_, summary) = engine.deploy("backend", &graph).await.unwrap();

        assert!(summary.created.is_empty());
        assert_eq!(summary.unchanged.len(), 3);
        assert_eq!(provisioner.creates.lock().len(), first_count);
    }

    #[tokio::test]
    async fn failure_keeps_prior_resources_and_surfaces_the_name() {
        let dir = tempdir().unwrap();
        let provisioner = Arc::new(StubProvisioner::failing_on("db"));
        let engine = Engine::new(provisioner.clone(), dir.path());

        let err = engine.deploy("backend", &sample_graph()).await.unwrap_err();
        match err {
            GraphError::ProvisioningFailed { resource, reason } => {
                assert_eq!(resource, "db");
                assert!(reason.contains("platform rejected"));
            }
            other => panic!("expected ProvisioningFailed, got {other:?}"),
        }

        // The network was created before the failure and must survive.
        let state = DeploymentState::load_or_new(dir.path(), "backend").unwrap();
        assert!(state.record("vpc").is_some());
        assert!(state.record("db").is_none());
    }

    #[tokio::test]
    async fn changed_spec_replaces_the_resource() {
        let dir = tempdir().unwrap();
        let provisioner = Arc::new(StubProvisioner::new());
        let engine = Engine::new(provisioner.clone(), dir.path());

        let mut graph = TopologyGraph::new();
        graph
            .add(
                ResourceSpec::new("bucket", ResourceKind::ObjectStore)
                    .with_property("versioned", Attr::lit("false")),
            )
            .unwrap();
        engine.deploy("backend", &graph).await.unwrap();

        let mut changed = TopologyGraph::new();
        changed
            .add(
                ResourceSpec::new("bucket", ResourceKind::ObjectStore)
                    .with_property("versioned", Attr::lit("true")),
            )
            .unwrap();
        let (_, summary) = engine.deploy("backend", &changed).await.unwrap();

        assert_eq!(summary.replaced, vec!["bucket".to_string()]);
        assert_eq!(provisioner.deletes.lock().as_slice(), ["bucket"]);
    }

    #[tokio::test]
    async fn destroy_honors_removal_policy() {
        let dir = tempdir().unwrap();
        let provisioner = Arc::new(StubProvisioner::new());
        let engine = Engine::new(provisioner.clone(), dir.path());

        let mut graph = TopologyGraph::new();
        graph
            .add(ResourceSpec::new("bucket", ResourceKind::ObjectStore))
            .unwrap();
        graph
            .add(
                ResourceSpec::new("db", ResourceKind::RelationalStore)
                    .with_removal_policy(RemovalPolicy::Retain),
            )
            .unwrap();
        engine.deploy("backend", &graph).await.unwrap();

        let summary = engine.destroy("backend", &graph).await.unwrap();

        assert_eq!(summary.deleted, vec!["bucket".to_string()]);
        assert_eq!(summary.retained, vec!["db".to_string()]);
        assert!(!DeploymentState::path_for(dir.path(), "backend").exists());
    }
}
