//! Engine configuration.
//!
//! Loaded from a YAML file with env-friendly defaults. Risk thresholds and
//! estimation rates are deliberately not configurable: predictions must stay
//! comparable across restarts for variance tracking to mean anything.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Connection settings for the configuration backend and usage query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the configuration backend.
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Base URL of the orchestration runtime's usage API; defaults to the
    /// backend base URL.
    #[serde(default)]
    pub usage_base_url: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            usage_base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Advisor (AI collaborator) settings. Disabled means the no-op advisor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdvisorSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Model override; falls back to the provider default.
    #[serde(default)]
    pub model: Option<String>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between analysis ticks, in seconds.
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,
    /// Interval between trigger polls, in seconds.
    #[serde(default = "default_trigger_interval")]
    pub trigger_interval_secs: u64,
    /// Drop monitors for spaces the backend no longer reports.
    #[serde(default = "default_true")]
    pub prune_stale_spaces: bool,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub advisor: AdvisorSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: default_analysis_interval(),
            trigger_interval_secs: default_trigger_interval(),
            prune_stale_spaces: true,
            backend: BackendSettings::default(),
            advisor: AdvisorSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> CoreResult<()> {
        if self.analysis_interval_secs == 0 {
            return Err(CoreError::Config(
                "analysis_interval_secs must be positive".to_string(),
            ));
        }
        if self.trigger_interval_secs == 0 {
            return Err(CoreError::Config(
                "trigger_interval_secs must be positive".to_string(),
            ));
        }
        if self.backend.base_url.is_empty() {
            return Err(CoreError::Config("backend.base_url is required".to_string()));
        }
        Ok(())
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_secs(self.analysis_interval_secs)
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_secs(self.trigger_interval_secs)
    }
}

fn default_analysis_interval() -> u64 {
    60
}

fn default_trigger_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
