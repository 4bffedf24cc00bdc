//! # costwatch_core
//!
//! The monitoring engine: per-space cost state, change detection, hook
//! triggering and the orchestrator that ties them together.
//!
//! Two independent periodic tasks converge on shared per-space state:
//! - the analysis tick ([`CostImpactMonitor`]) estimates, risk-scores and
//!   snapshots every known space concurrently
//! - the trigger poll ([`TriggerProcessor`]) drives pre-apply/post-apply hook
//!   chains off observed unit transitions and feeds deployment cost records
//!   back into the owning [`SpaceMonitor`]
//!
//! The engine is advisory only: it never gates deployments and never mutates
//! configuration units.

pub mod config;
pub mod detector;
pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod triggers;

pub use config::{AdvisorSettings, BackendSettings, EngineConfig};
pub use detector::{ChangeDetector, TransitionKind, UnitTransition};
pub use error::{CoreError, CoreResult};
pub use monitor::SpaceMonitor;
pub use orchestrator::{CostImpactMonitor, SharedMonitors};
pub use triggers::{CostWarningHook, PostApplyHook, PreApplyHook, TriggerProcessor, UsageLogHook};
