//! Persisted deployment state.
//!
//! One JSON file per topology under `<state_dir>/.weft/state/`. The state
//! is saved after every completed wave so that a failed build leaves a
//! well-defined partial record of what exists.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{GraphError, GraphResult};
use crate::node::{RemovalPolicy, ResourceKind, ResourceOutputs};

/// Record of a created resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Logical name within the topology.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Removal policy in force at creation.
    pub removal_policy: RemovalPolicy,
    /// Fingerprint of the spec plus its resolved properties; an unchanged
    /// fingerprint on re-deploy means the resource is reused as-is.
    pub fingerprint: String,
    /// Identifying outputs, immutable once set.
    pub outputs: ResourceOutputs,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
}

/// Persistent state of one deployed topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Topology name (state file stem).
    pub topology: String,
    /// Unique id assigned on first deployment.
    pub deployment_id: Uuid,
    /// Records of every created resource, keyed by logical name.
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Last time the state was written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeploymentState {
    /// Create an empty state for a topology.
    pub fn new(topology: impl Into<String>) -> Self {
        Self {
            topology: topology.into(),
            deployment_id: Uuid::new_v4(),
            resources: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// State file path for a topology under a state directory.
    pub fn path_for(state_dir: &Path, topology: &str) -> PathBuf {
        state_dir
            .join(".weft")
            .join("state")
            .join(format!("{topology}.json"))
    }

    /// Load a topology's state, or a fresh state if none exists.
    pub fn load_or_new(state_dir: &Path, topology: &str) -> GraphResult<Self> {
        let path = Self::path_for(state_dir, topology);
        if !path.exists() {
            return Ok(Self::new(topology));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Save the state, creating parent directories as needed.
    pub fn save(&mut self, state_dir: &Path) -> GraphResult<()> {
        self.updated_at = Some(Utc::now());
        let path = Self::path_for(state_dir, &self.topology);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        debug!(topology = %self.topology, path = %path.display(), "saved deployment state");
        Ok(())
    }

    /// Remove the state file after a full teardown.
    pub fn remove_file(state_dir: &Path, topology: &str) -> GraphResult<()> {
        let path = Self::path_for(state_dir, topology);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn record(&self, name: &str) -> Option<&ResourceRecord> {
        self.resources.get(name)
    }

    /// Outputs of a created resource, if any.
    pub fn outputs(&self, name: &str) -> Option<&ResourceOutputs> {
        self.resources.get(name).map(|r| &r.outputs)
    }
}
