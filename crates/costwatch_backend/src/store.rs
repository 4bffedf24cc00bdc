//! Collaborator traits.

use async_trait::async_trait;

use costwatch_model::{CostRecordPayload, ResourceUsage, Space, Unit};

use crate::error::BackendResult;

/// The configuration-management backend.
///
/// Read-mostly: the only write is `create_record`, which persists advisory
/// cost warnings. Deployable units are never mutated.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// List all spaces currently known to the backend.
    async fn list_spaces(&self) -> BackendResult<Vec<Space>>;

    /// List the units of one space. One call yields one consistent listing;
    /// analysis never mixes two listings within a tick.
    async fn list_units(&self, space_id: &str) -> BackendResult<Vec<Unit>>;

    /// Persist an advisory record against a space.
    async fn create_record(&self, space_id: &str, payload: &CostRecordPayload)
        -> BackendResult<()>;
}

/// The orchestration runtime's resource usage query.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Observed CPU/memory consumption for a deployed unit.
    async fn unit_usage(&self, space_id: &str, unit_id: &str) -> BackendResult<ResourceUsage>;
}
