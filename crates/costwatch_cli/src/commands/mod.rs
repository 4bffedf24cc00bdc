//! CLI command definitions.
//!
//! Two subcommands: `run` starts the monitoring daemon, `snapshot` performs
//! one discovery + analysis pass and prints the global snapshot as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use costwatch_assess::{Advisor, LlmAdvisor, NoopAdvisor};
use costwatch_backend::{ConfigStore, HttpConfig, HttpConfigStore, HttpUsageSource, UsageSource};
use costwatch_core::EngineConfig;

pub mod run;
pub mod snapshot;

/// costwatch - cost-impact monitoring for declarative configuration spaces
#[derive(Parser)]
#[command(name = "costwatch")]
#[command(version, about = "Cost-impact monitoring for declarative configuration spaces")]
#[command(long_about = r#"
costwatch continuously watches a fleet of configuration spaces, estimates the
monthly cost of declared changes before they apply, risk-scores them, and
tracks prediction accuracy against observed usage after deployment.

COMMANDS:
  run       → Start the monitoring daemon (analysis tick + trigger poll)
  snapshot  → One analysis pass; print the global snapshot as JSON

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments / configuration
  3 - Configuration backend unreachable
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the monitoring daemon
    Run(run::RunArgs),

    /// One analysis pass, JSON snapshot to stdout
    Snapshot(snapshot::SnapshotArgs),
}

/// Arguments shared by both subcommands.
#[derive(Args)]
pub struct CommonArgs {
    /// Path to the YAML engine configuration
    #[arg(short, long, default_value = "costwatch.yaml")]
    pub config: PathBuf,
}

impl CommonArgs {
    /// Load the engine configuration, falling back to defaults when the
    /// default config file does not exist.
    pub fn load_config(&self) -> anyhow::Result<EngineConfig> {
        if self.config.exists() {
            EngineConfig::from_yaml_file(&self.config)
                .with_context(|| format!("loading configuration from {}", self.config.display()))
        } else {
            warn!(
                "Config file {} not found, using defaults",
                self.config.display()
            );
            Ok(EngineConfig::default())
        }
    }
}

/// Build the external collaborators from configuration.
pub fn collaborators(
    config: &EngineConfig,
) -> (Arc<dyn ConfigStore>, Arc<dyn UsageSource>, Arc<dyn Advisor>) {
    let timeout = Duration::from_secs(config.backend.request_timeout_secs);

    let mut store_config = HttpConfig::new(&config.backend.base_url).timeout(timeout);
    if let Some(token) = &config.backend.token {
        store_config = store_config.token(token);
    }
    let store: Arc<dyn ConfigStore> = Arc::new(HttpConfigStore::new(store_config));

    let usage_base = config
        .backend
        .usage_base_url
        .clone()
        .unwrap_or_else(|| config.backend.base_url.clone());
    let mut usage_config = HttpConfig::new(usage_base).timeout(timeout);
    if let Some(token) = &config.backend.token {
        usage_config = usage_config.token(token);
    }
    let usage: Arc<dyn UsageSource> = Arc::new(HttpUsageSource::new(usage_config));

    let advisor: Arc<dyn Advisor> = if config.advisor.enabled {
        match LlmAdvisor::from_env() {
            Ok(mut advisor) => {
                if let Some(model) = &config.advisor.model {
                    advisor = advisor.with_model(model);
                }
                info!("Advisor enabled (model {})", advisor.model());
                Arc::new(advisor)
            }
            Err(e) => {
                warn!("Advisor enabled but not usable, running without: {}", e);
                Arc::new(NoopAdvisor)
            }
        }
    } else {
        Arc::new(NoopAdvisor)
    };

    (store, usage, advisor)
}
