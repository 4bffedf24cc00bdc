//! Data models for cost-impact monitoring.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accuracy threshold for deployment cost predictions, in percent.
pub const ACCURACY_THRESHOLD_PCT: f64 = 10.0;

/// A cost trend flatter than this is reported as stable, in percent.
pub const TREND_STABLE_BAND_PCT: f64 = 5.0;

/// Maximum number of deployment cost records retained per space.
pub const DEPLOYMENT_HISTORY_CAP: usize = 100;

/// A named, logically grouped collection of configuration units tracked
/// independently for cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Space {
    pub id: String,
    pub name: String,
}

impl Space {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Live deployment state reported by the configuration backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    Applied,
    Progressing,
    Degraded,
}

/// What the runtime currently knows about a unit's deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveStatus {
    pub state: LiveState,
    /// Revision the runtime has applied (may lag `Unit::revision`).
    pub revision: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl LiveStatus {
    pub fn is_applied(&self) -> bool {
        self.state == LiveState::Applied
    }
}

/// One declared, labeled configuration document within a space.
///
/// Immutable from the engine's point of view except for externally observed
/// status changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Opaque revision identifier; changes whenever the document is edited.
    pub revision: String,
    pub updated_at: DateTime<Utc>,
    /// Absent until the runtime has seen the unit at least once.
    #[serde(default)]
    pub live: Option<LiveStatus>,
    /// Raw YAML manifest as stored by the backend.
    pub manifest: String,
}

impl Unit {
    /// A unit is pending when the runtime has not applied its current
    /// revision: never seen, revision drift, or a non-applied live state.
    pub fn is_pending(&self) -> bool {
        match &self.live {
            None => true,
            Some(live) => !live.is_applied() || live.revision != self.revision,
        }
    }
}

/// Declared resource requests parsed from a unit manifest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceHints {
    pub cpu_cores: f64,
    pub memory_gib: f64,
    pub replicas: u32,
}

impl Default for ResourceHints {
    fn default() -> Self {
        Self {
            cpu_cores: 0.0,
            memory_gib: 0.0,
            replicas: 1,
        }
    }
}

/// Observed resource consumption for a deployed unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub cpu_cores: f64,
    pub memory_gib: f64,
}

/// Whether a pending change introduces a unit or modifies one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
        }
    }
}

/// Coarse ordinal summarizing the stakes of a change.
///
/// Ordered: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// One step up the ladder; Critical stays Critical.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High => RiskLevel::Critical,
            RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Risk verdict for one pending change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub recommendation: String,
    pub auto_approve: bool,
    /// Optional AI-authored narrative; never influences the fields above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// A unit not yet reflected in the live runtime, with its predicted cost
/// impact. Recomputed on every analysis tick; at most one per pending unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub space_id: String,
    pub unit_id: String,
    pub unit_name: String,
    pub kind: ChangeKind,
    pub current_cost: f64,
    pub projected_cost: f64,
    pub cost_delta: f64,
    pub risk: RiskAssessment,
    /// Set when analysis degraded, e.g. an unparseable manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Outcome of one observed deployment, comparing predicted to actual cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentCostRecord {
    pub unit_id: String,
    pub deploy_time: DateTime<Utc>,
    pub predicted_cost: f64,
    pub actual_cost: f64,
    pub variance_pct: f64,
    pub accurate: bool,
}

impl DeploymentCostRecord {
    /// Build a record, deriving variance and accuracy from the two costs.
    ///
    /// Variance is relative to the prediction; a zero prediction is accurate
    /// only when the actual cost is also zero.
    pub fn new(
        unit_id: impl Into<String>,
        deploy_time: DateTime<Utc>,
        predicted_cost: f64,
        actual_cost: f64,
    ) -> Self {
        let variance_pct = if predicted_cost.abs() > f64::EPSILON {
            (actual_cost - predicted_cost) / predicted_cost * 100.0
        } else if actual_cost.abs() > f64::EPSILON {
            100.0
        } else {
            0.0
        };
        Self {
            unit_id: unit_id.into(),
            deploy_time,
            predicted_cost,
            actual_cost,
            variance_pct,
            accurate: variance_pct.abs() <= ACCURACY_THRESHOLD_PCT,
        }
    }
}

/// Recent directional movement of a space's realized monthly cost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Derived from the last two deployment cost records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostTrend {
    pub direction: TrendDirection,
    pub weekly_delta_pct: f64,
    pub projected_monthly_cost: f64,
}

impl CostTrend {
    /// Compute the trend between two consecutive realized costs.
    pub fn between(previous: f64, latest: f64) -> Self {
        let weekly_delta_pct = if previous.abs() > f64::EPSILON {
            (latest - previous) / previous * 100.0
        } else if latest.abs() > f64::EPSILON {
            100.0
        } else {
            0.0
        };
        let direction = if weekly_delta_pct > TREND_STABLE_BAND_PCT {
            TrendDirection::Increasing
        } else if weekly_delta_pct < -TREND_STABLE_BAND_PCT {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        Self {
            direction,
            weekly_delta_pct,
            projected_monthly_cost: latest * (1.0 + weekly_delta_pct / 100.0),
        }
    }
}

/// Per-space view inside a global snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpaceSnapshot {
    pub space_id: String,
    pub space_name: String,
    pub current_cost: f64,
    pub projected_cost: f64,
    pub pending_changes: Vec<PendingChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<CostTrend>,
    pub analyzed_at: DateTime<Utc>,
}

/// On-demand aggregation across all monitored spaces. Never persisted; the
/// dashboard reads the last committed one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSnapshot {
    pub computed_at: DateTime<Utc>,
    pub total_cost: f64,
    pub projected_cost: f64,
    pub pending_change_count: usize,
    pub high_risk_count: usize,
    pub spaces: Vec<SpaceSnapshot>,
}

/// Advisory record persisted through the configuration backend. The only
/// thing this engine ever writes there; units are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostRecordPayload {
    pub kind: String,
    pub unit_id: String,
    pub risk_level: RiskLevel,
    pub cost_delta: f64,
    pub projected_cost: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl CostRecordPayload {
    /// Build a cost-warning payload for a risky pending change.
    pub fn warning(change: &PendingChange) -> Self {
        Self {
            kind: "cost-warning".to_string(),
            unit_id: change.unit_id.clone(),
            risk_level: change.risk.level,
            cost_delta: change.cost_delta,
            projected_cost: change.projected_cost,
            message: format!(
                "{} risk change to '{}': monthly cost delta ${:.2}",
                change.risk.level, change.unit_name, change.cost_delta
            ),
            created_at: change.analyzed_at,
        }
    }
}
