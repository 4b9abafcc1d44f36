//! Deployment configuration shared by both topologies.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StackResult;

/// Default region the assistant targets.
pub const DEFAULT_REGION: &str = "eu-central-1";

/// Default model identifier the compute unit invokes.
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-v2";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_account() -> String {
    "123456789012".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Deployment configuration, loadable from `weft.yaml` with every field
/// optional; CLI flags override file values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub region: String,
    /// Account identifiers are minted against.
    pub account: String,
    pub model_id: String,
    pub environment: String,
    /// Single-point override: flips every store in the topology from
    /// ephemeral to durable. Use for production installs.
    pub retain_data: bool,
    /// Directory holding deployment state and the parameter channel.
    pub state_dir: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            account: default_account(),
            model_id: default_model_id(),
            environment: default_environment(),
            retain_data: false,
            state_dir: default_state_dir(),
        }
    }
}

impl DeployConfig {
    /// Load from a YAML file; absent fields take their defaults.
    pub fn from_file(path: &Path) -> StackResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
