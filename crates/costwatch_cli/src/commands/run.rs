//! `run` command - start the monitoring daemon.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use costwatch_core::{CostImpactMonitor, CostWarningHook, TriggerProcessor, UsageLogHook};

use super::{collaborators, CommonArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = args.common.load_config()?;
    let (store, usage, advisor) = collaborators(&config);

    let mut orchestrator = CostImpactMonitor::new(store.clone(), advisor);
    if !config.prune_stale_spaces {
        orchestrator = orchestrator.keep_stale_spaces();
    }
    let orchestrator = Arc::new(orchestrator);

    let processor = TriggerProcessor::new(store.clone(), usage, orchestrator.monitors())
        .with_pre_hook(Arc::new(CostWarningHook::new(store)))
        .with_post_hook(Arc::new(UsageLogHook));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let trigger_task = tokio::spawn(processor.run(config.trigger_interval(), shutdown_rx.clone()));

    let mut analysis_task = {
        let orchestrator = orchestrator.clone();
        let period = config.analysis_interval();
        let shutdown = shutdown_rx;
        tokio::spawn(async move { orchestrator.run(period, shutdown).await })
    };

    info!(
        "costwatch running: analysis every {}s, trigger poll every {}s (ctrl-c to stop)",
        config.analysis_interval_secs, config.trigger_interval_secs
    );

    tokio::select! {
        result = &mut analysis_task => {
            // The analysis loop only returns on its own for the startup hard
            // failure; surface it and stop the trigger loop too.
            let _ = shutdown_tx.send(true);
            let _ = trigger_task.await;
            return result
                .context("analysis task terminated")?
                .map_err(Into::into);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, finishing in-flight work");
            let _ = shutdown_tx.send(true);
        }
    }

    analysis_task
        .await
        .context("analysis task terminated")??;
    trigger_task.await.context("trigger task terminated")?;
    Ok(())
}
