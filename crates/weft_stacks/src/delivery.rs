//! The delivery topology: hosted chat UI wired to the backend purely
//! through the parameter channel. It never touches backend state and
//! fails fast when the backend has not published yet.

use std::sync::Arc;

use tracing::info;

use weft_graph::{
    Attr, DeploySummary, DestroySummary, Engine, Provisioner, ResourceKind, ResourceSpec,
    TopologyGraph,
};
use weft_params::{keys, ParameterChannel};

use crate::backend::required_output;
use crate::config::DeployConfig;
use crate::error::StackResult;

/// Topology name; also the state file stem.
pub const DELIVERY_TOPOLOGY: &str = "chatui-delivery";

pub mod names {
    pub const REPOSITORY: &str = "chatui-repo";
    pub const WEB_APP: &str = "chatui-app";
}

/// Build environment the hosted UI is compiled with.
const CUSTOM_IMAGE_KEY: &str = "_CUSTOM_IMAGE";
const CUSTOM_IMAGE: &str = "amplify:al2023";
const ENV_USER_POOL_ID: &str = "AMPLIFY_USERPOOL_ID";
const ENV_USER_POOL_CLIENT_ID: &str = "COGNITO_USERPOOL_CLIENT_ID";
const ENV_API_ENDPOINT: &str = "API_ENDPOINT";

/// Key identifiers of a deployed UI.
#[derive(Debug, Clone)]
pub struct DeliveryOutputs {
    pub app_url: String,
    pub repository_url: String,
    pub summary: DeploySummary,
}

impl std::fmt::Display for DeliveryOutputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Delivery topology deployed")?;
        writeln!(f, "  App URL:    {}", self.app_url)?;
        writeln!(f, "  Repository: {}", self.repository_url)
    }
}

/// Assembles and deploys the hosted chat UI.
pub struct DeliveryTopology {
    config: DeployConfig,
}

impl DeliveryTopology {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Build the delivery graph from published backend parameters.
    /// Every read is fail-fast; a missing key aborts before any
    /// resource exists.
    pub fn plan(&self, channel: &ParameterChannel) -> StackResult<TopologyGraph> {
        let user_pool_id = channel.read(keys::COGNITO_USER_POOL_ID)?;
        let user_pool_client_id = channel.read(keys::COGNITO_USER_POOL_CLIENT_ID)?;
        let api_endpoint = channel.read(keys::AGENT_API)?;
        info!(
            user_pool_id = %user_pool_id,
            api_endpoint = %api_endpoint,
            "resolved backend parameters for delivery"
        );

        let mut graph = TopologyGraph::new();
        graph.add(ResourceSpec::new(names::REPOSITORY, ResourceKind::Repository))?;
        graph.add(
            ResourceSpec::new(names::WEB_APP, ResourceKind::WebApp)
                .with_property("repository", Attr::output(names::REPOSITORY, "clone_url"))
                .with_property("branch", Attr::lit("main"))
                .with_property("stage", Attr::lit("PRODUCTION"))
                .with_property(format!("env.{CUSTOM_IMAGE_KEY}"), Attr::lit(CUSTOM_IMAGE))
                .with_property(format!("env.{ENV_USER_POOL_ID}"), Attr::lit(user_pool_id))
                .with_property(
                    format!("env.{ENV_USER_POOL_CLIENT_ID}"),
                    Attr::lit(user_pool_client_id),
                )
                .with_property(format!("env.{ENV_API_ENDPOINT}"), Attr::lit(api_endpoint)),
        )?;
        graph.validate()?;
        Ok(graph)
    }

    pub async fn deploy(
        &self,
        provisioner: Arc<dyn Provisioner>,
        channel: &ParameterChannel,
    ) -> StackResult<DeliveryOutputs> {
        let graph = self.plan(channel)?;
        let engine = Engine::new(provisioner, &self.config.state_dir);
        let (state, summary) = engine.deploy(DELIVERY_TOPOLOGY, &graph).await?;

        Ok(DeliveryOutputs {
            app_url: required_output(&state, names::WEB_APP, "url")?,
            repository_url: required_output(&state, names::REPOSITORY, "clone_url")?,
            summary,
        })
    }

    pub async fn destroy(
        &self,
        provisioner: Arc<dyn Provisioner>,
        channel: &ParameterChannel,
    ) -> StackResult<DestroySummary> {
        let graph = self.plan(channel)?;
        let engine = Engine::new(provisioner, &self.config.state_dir);
        Ok(engine.destroy(DELIVERY_TOPOLOGY, &graph).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_params::{InMemoryBackend, ParamError};

    use crate::error::StackError;

    fn channel_with_backend_keys() -> ParameterChannel {
        let channel = ParameterChannel::new(Arc::new(InMemoryBackend::new()), "assistant-backend");
        channel
            .publish(keys::COGNITO_USER_POOL_ID, "eu-central-1_abc12345")
            .unwrap();
        channel
            .publish(keys::COGNITO_USER_POOL_CLIENT_ID, "client123")
            .unwrap();
        channel
            .publish(
                keys::AGENT_API,
                "https://abc.execute-api.eu-central-1.amazonaws.com/prod/",
            )
            .unwrap();
        channel
    }

    #[test]
    fn plan_wires_build_environment_from_channel() {
        let channel = channel_with_backend_keys();
        let graph = DeliveryTopology::new(DeployConfig::default())
            .plan(&channel)
            .unwrap();

        let app = graph.get(names::WEB_APP).unwrap();
        assert_eq!(
            app.properties.get("env._CUSTOM_IMAGE"),
            Some(&Attr::lit("amplify:al2023"))
        );
        assert_eq!(
            app.properties.get("env.AMPLIFY_USERPOOL_ID"),
            Some(&Attr::lit("eu-central-1_abc12345"))
        );
        assert_eq!(
            app.properties.get("env.COGNITO_USERPOOL_CLIENT_ID"),
            Some(&Attr::lit("client123"))
        );
        assert!(app.dependencies().contains(names::REPOSITORY));
    }

    #[test]
    fn plan_fails_fast_when_backend_has_not_published() {
        let channel = ParameterChannel::new(Arc::new(InMemoryBackend::new()), "chatui-delivery");
        let err = DeliveryTopology::new(DeployConfig::default())
            .plan(&channel)
            .unwrap_err();
        assert!(matches!(
            err,
            StackError::Param(ParamError::MissingParameter(_))
        ));
    }
}
