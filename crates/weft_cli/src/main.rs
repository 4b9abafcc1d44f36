//! weft CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Provisioning failure
//! - 5: Missing dependency (backend not deployed)

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIGURATION_ERROR: u8 = 3;
    pub const PROVISIONING_FAILURE: u8 = 4;
    pub const MISSING_DEPENDENCY: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("weft=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::DeployBackend(args) => commands::deploy_backend::execute(args).await,
        Commands::DeployFrontend(args) => commands::deploy_frontend::execute(args).await,
        Commands::Destroy(args) => commands::destroy::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("missing parameter") {
        ExitCodes::MISSING_DEPENDENCY
    } else if msg.contains("cycle")
        || msg.contains("unknown resource")
        || msg.contains("duplicate resource")
        || msg.contains("config")
        || msg.contains("availability zones")
        || msg.contains("nat")
    {
        // Graph-shape problems fail before any resource is touched, so
        // they categorize with configuration, not provisioning.
        ExitCodes::CONFIGURATION_ERROR
    } else if msg.contains("provisioning") || msg.contains("provider") {
        ExitCodes::PROVISIONING_FAILURE
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_graph::GraphError;
    use weft_params::ParamError;

    fn categorized(e: impl Into<anyhow::Error>) -> u8 {
        categorize_error(&e.into())
    }

    #[test]
    fn cyclic_dependency_is_a_configuration_error() {
        let err = GraphError::DependencyCycle(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(categorized(err), ExitCodes::CONFIGURATION_ERROR);
    }

    #[test]
    fn failed_resource_is_a_provisioning_error() {
        let err = GraphError::ProvisioningFailed {
            resource: "agent-db".to_string(),
            reason: "rejected".to_string(),
        };
        assert_eq!(categorized(err), ExitCodes::PROVISIONING_FAILURE);
    }

    #[test]
    fn unpublished_channel_key_is_a_missing_dependency() {
        let err = ParamError::MissingParameter("/AgenticLLMAssistant/agent_api".to_string());
        assert_eq!(categorized(err), ExitCodes::MISSING_DEPENDENCY);
    }
}
