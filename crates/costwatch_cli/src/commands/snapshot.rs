//! `snapshot` command - one analysis pass, JSON to stdout.

use anyhow::Context;
use clap::Args;

use costwatch_core::CostImpactMonitor;

use super::{collaborators, CommonArgs};

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print only pending changes instead of the full snapshot
    #[arg(long)]
    pub pending_only: bool,
}

pub async fn execute(args: SnapshotArgs) -> anyhow::Result<()> {
    let config = args.common.load_config()?;
    let (store, _usage, advisor) = collaborators(&config);

    let orchestrator = CostImpactMonitor::new(store, advisor);
    let snapshot = orchestrator.tick().await.context("analysis pass failed")?;

    let json = if args.pending_only {
        let pending = orchestrator.pending_changes().await;
        serde_json::to_string_pretty(&pending)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{}", json);
    Ok(())
}
