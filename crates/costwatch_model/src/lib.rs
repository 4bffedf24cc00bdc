//! # costwatch_model
//!
//! Domain data model shared across the costwatch crates: spaces, units,
//! pending changes, deployment cost records, trends and snapshots.
//!
//! Everything here is plain data: no I/O, no clocks, no locks. Types that
//! cross the dashboard boundary serialize camelCase; everything else keeps
//! Rust field names.

pub mod model;

pub use model::{
    ChangeKind, CostRecordPayload, CostTrend, DeploymentCostRecord, GlobalSnapshot, LiveState,
    LiveStatus, PendingChange, ResourceHints, ResourceUsage, RiskAssessment, RiskLevel, Space,
    SpaceSnapshot, TrendDirection, Unit, ACCURACY_THRESHOLD_PCT, DEPLOYMENT_HISTORY_CAP,
    TREND_STABLE_BAND_PCT,
};
