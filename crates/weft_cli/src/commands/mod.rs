//! CLI command definitions.
//!
//! Each subcommand drives one topology workflow: the backend stack,
//! the delivery stack, or teardown of either.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use weft_cloud::LocalProvisioner;
use weft_params::{FileBackend, ParameterChannel};
use weft_stacks::DeployConfig;

pub mod deploy_backend;
pub mod deploy_frontend;
pub mod destroy;

/// weft - topology assembler for the agentic assistant
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about = "weft - topology assembler for the agentic assistant")]
#[command(long_about = r#"
weft assembles and converges the cloud topologies behind the agentic
assistant: a backend stack (network, stores, compute, identity, API)
and a delivery stack (hosted chat UI), wired together exclusively
through a namespaced parameter channel.

WORKFLOWS:
  deploy-backend  → Converge the backend topology and publish parameters
  deploy-frontend → Converge the chat UI from published parameters
  destroy         → Tear topologies down, honoring retention policies

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Provisioning failure
  5 - Missing dependency (backend not deployed)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the backend topology and publish its parameters
    #[command(name = "deploy-backend")]
    DeployBackend(deploy_backend::DeployBackendArgs),

    /// Deploy the chat UI from the backend's published parameters
    #[command(name = "deploy-frontend")]
    DeployFrontend(deploy_frontend::DeployFrontendArgs),

    /// Tear down deployed topologies
    Destroy(destroy::DestroyArgs),
}

/// Deployment options shared by every subcommand.
///
/// Flags are optional so that an explicitly passed value always wins
/// over the config file, even when it happens to equal a default.
#[derive(Args, Clone, Default)]
pub struct CommonArgs {
    /// Region identifiers are minted against [default: eu-central-1]
    #[arg(long, env = "WEFT_REGION")]
    pub region: Option<String>,

    /// Model identifier the compute unit is configured with
    /// [default: anthropic.claude-v2]
    #[arg(long, env = "WEFT_MODEL_ID")]
    pub model_id: Option<String>,

    /// Keep durable stores (database, secret, table, bucket) on teardown
    #[arg(long)]
    pub retain_data: bool,

    /// Directory holding deployment state and the parameter channel
    /// [default: .]
    #[arg(long, env = "WEFT_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Optional YAML config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    /// Resolve the effective deployment config: defaults, then the
    /// config file, then explicit flags.
    pub fn resolve(&self) -> anyhow::Result<DeployConfig> {
        let mut config = match &self.config {
            Some(path) => DeployConfig::from_file(path)?,
            None => DeployConfig::default(),
        };
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(model_id) = &self.model_id {
            config.model_id = model_id.clone();
        }
        if self.retain_data {
            config.retain_data = true;
        }
        if let Some(state_dir) = &self.state_dir {
            config.state_dir = state_dir.clone();
        }
        Ok(config)
    }

    pub fn provisioner(&self, config: &DeployConfig) -> Arc<LocalProvisioner> {
        Arc::new(LocalProvisioner::new(&config.region).with_account(&config.account))
    }

    pub fn channel(&self, config: &DeployConfig, topology: &str) -> ParameterChannel {
        ParameterChannel::new(Arc::new(FileBackend::new(&config.state_dir)), topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use weft_stacks::{DEFAULT_MODEL_ID, DEFAULT_REGION};

    #[test]
    fn absent_flags_resolve_to_defaults() {
        let config = CommonArgs::default().resolve().unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert!(!config.retain_data);
        assert_eq!(config.state_dir, PathBuf::from("."));
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "region: us-east-1\nmodel_id: anthropic.claude-3").unwrap();

        let args = CommonArgs {
            config: Some(file.path().to_path_buf()),
            ..CommonArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.model_id, "anthropic.claude-3");
    }

    #[test]
    fn explicit_flag_overrides_file_even_when_it_equals_the_default() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "region: us-east-1").unwrap();

        let args = CommonArgs {
            region: Some(DEFAULT_REGION.to_string()),
            config: Some(file.path().to_path_buf()),
            ..CommonArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
    }
}
