//! # costwatch_backend
//!
//! Clients for the two external collaborators the engine consumes:
//! - **ConfigStore**: the configuration-management backend holding spaces and
//!   units and accepting advisory cost-warning records
//! - **UsageSource**: the orchestration runtime's per-unit resource usage query
//!
//! Both are trait seams with HTTP implementations and scriptable in-memory
//! mocks. The engine never mutates configuration units through either.

pub mod error;
pub mod http;
pub mod mock;
pub mod store;

pub use error::{BackendError, BackendResult};
pub use http::{HttpConfig, HttpConfigStore, HttpUsageSource};
pub use mock::{MockConfigStore, MockUsageSource};
pub use store::{ConfigStore, UsageSource};
