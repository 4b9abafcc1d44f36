//! Deploy-frontend command - Converge the chat UI from published
//! backend parameters.

use anyhow::Result;
use clap::Args;
use tracing::info;

use weft_stacks::{DeliveryTopology, DELIVERY_TOPOLOGY};

use super::CommonArgs;

#[derive(Args)]
pub struct DeployFrontendArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn execute(args: DeployFrontendArgs) -> Result<()> {
    let config = args.common.resolve()?;
    info!(state_dir = %config.state_dir.display(), "deploying delivery topology");

    let provisioner = args.common.provisioner(&config);
    let channel = args.common.channel(&config, DELIVERY_TOPOLOGY);
    let outputs = DeliveryTopology::new(config)
        .deploy(provisioner, &channel)
        .await?;

    println!("✅ {outputs}");
    Ok(())
}
