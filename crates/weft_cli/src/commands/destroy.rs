//! Destroy command - Tear down deployed topologies.

use anyhow::Result;
use clap::{Args, ValueEnum};
use tracing::info;

use weft_graph::DestroySummary;
use weft_stacks::{
    BackendTopology, DeliveryTopology, StackError, BACKEND_TOPOLOGY, DELIVERY_TOPOLOGY,
};

use super::CommonArgs;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Both topologies, delivery first
    All,
    Backend,
    Frontend,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Which topology to tear down
    #[arg(long, value_enum, default_value_t = Target::All)]
    pub target: Target,
}

pub async fn execute(args: DestroyArgs) -> Result<()> {
    let config = args.common.resolve()?;
    info!(retain_data = config.retain_data, "destroying topologies");

    if matches!(args.target, Target::All | Target::Frontend) {
        let provisioner = args.common.provisioner(&config);
        let channel = args.common.channel(&config, DELIVERY_TOPOLOGY);
        let result = DeliveryTopology::new(config.clone())
            .destroy(provisioner, &channel)
            .await;
        match result {
            Ok(summary) => report("delivery", &summary),
            // Backend parameters were never published, so the UI was
            // never deployed; nothing to tear down for `all`.
            Err(StackError::Param(_)) if args.target == Target::All => {
                info!("delivery topology was never deployed, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if matches!(args.target, Target::All | Target::Backend) {
        let provisioner = args.common.provisioner(&config);
        let channel = args.common.channel(&config, BACKEND_TOPOLOGY);
        let summary = BackendTopology::new(config)
            .destroy(provisioner, &channel)
            .await?;
        report("backend", &summary);
    }

    Ok(())
}

fn report(topology: &str, summary: &DestroySummary) {
    println!(
        "✅ {} topology destroyed ({} deleted, {} retained)",
        topology,
        summary.deleted.len(),
        summary.retained.len()
    );
    for name in &summary.retained {
        println!("   retained: {name}");
    }
}
