//! Deploy-backend command - Converge the backend topology.

use anyhow::Result;
use clap::Args;
use tracing::info;

use weft_stacks::{BackendTopology, BACKEND_TOPOLOGY};

use super::CommonArgs;

#[derive(Args)]
pub struct DeployBackendArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Plan only: print the resource waves without provisioning
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: DeployBackendArgs) -> Result<()> {
    let config = args.common.resolve()?;
    info!(
        region = %config.region,
        model_id = %config.model_id,
        "deploying backend topology"
    );

    let topology = BackendTopology::new(config.clone());

    if args.dry_run {
        let plan = topology.plan()?;
        println!("📋 Backend plan ({} resources):", plan.graph.len());
        for (index, wave) in plan.graph.build_order()?.iter().enumerate() {
            println!("   wave {}: {}", index, wave.join(", "));
        }
        return Ok(());
    }

    let provisioner = args.common.provisioner(&config);
    let channel = args.common.channel(&config, BACKEND_TOPOLOGY);
    let outputs = topology.deploy(provisioner, &channel).await?;

    println!("✅ {outputs}");
    println!(
        "   ({} created, {} unchanged, {} replaced)",
        outputs.summary.created.len(),
        outputs.summary.unchanged.len(),
        outputs.summary.replaced.len()
    );
    Ok(())
}
