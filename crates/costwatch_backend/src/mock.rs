//! Mock collaborators for testing.
//!
//! In-memory, scriptable implementations of [`ConfigStore`] and
//! [`UsageSource`] so engine behavior can be exercised without a live
//! backend. They capture calls for verification and can simulate failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use costwatch_model::{CostRecordPayload, LiveState, LiveStatus, ResourceUsage, Space, Unit};

use crate::error::{BackendError, BackendResult};
use crate::store::{ConfigStore, UsageSource};

/// Mock configuration backend.
#[derive(Clone, Default)]
pub struct MockConfigStore {
    spaces: Arc<RwLock<Vec<Space>>>,
    units: Arc<RwLock<HashMap<String, Vec<Unit>>>>,
    /// Advisory records captured per space.
    records: Arc<RwLock<Vec<(String, CostRecordPayload)>>>,
    /// When set, list_spaces fails with this message.
    fail_spaces: Arc<RwLock<Option<String>>>,
    /// Space ids whose list_units calls fail.
    fail_units: Arc<RwLock<Vec<String>>>,
    list_units_calls: Arc<RwLock<Vec<String>>>,
}

impl MockConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a space with its units.
    pub fn with_space(self, space: Space, units: Vec<Unit>) -> Self {
        self.units.write().insert(space.id.clone(), units);
        self.spaces.write().push(space);
        self
    }

    /// Replace the full space list.
    pub fn set_spaces(&self, spaces: Vec<Space>) {
        *self.spaces.write() = spaces;
    }

    /// Replace the units of one space.
    pub fn set_units(&self, space_id: &str, units: Vec<Unit>) {
        self.units.write().insert(space_id.to_string(), units);
    }

    /// Flip one unit's live status to applied at its current revision.
    pub fn mark_applied(&self, space_id: &str, unit_id: &str) {
        if let Some(units) = self.units.write().get_mut(space_id) {
            for unit in units.iter_mut().filter(|u| u.id == unit_id) {
                unit.live = Some(LiveStatus {
                    state: LiveState::Applied,
                    revision: unit.revision.clone(),
                    applied_at: Some(Utc::now()),
                });
            }
        }
    }

    /// Simulate list_spaces failure.
    pub fn fail_list_spaces(&self, message: impl Into<String>) {
        *self.fail_spaces.write() = Some(message.into());
    }

    /// Clear the list_spaces failure.
    pub fn restore_list_spaces(&self) {
        *self.fail_spaces.write() = None;
    }

    /// Simulate list_units failure for one space.
    pub fn fail_list_units(&self, space_id: impl Into<String>) {
        self.fail_units.write().push(space_id.into());
    }

    /// Captured advisory records.
    pub fn recorded(&self) -> Vec<(String, CostRecordPayload)> {
        self.records.read().clone()
    }

    /// How many times list_units was called for a space.
    pub fn list_units_count(&self, space_id: &str) -> usize {
        self.list_units_calls
            .read()
            .iter()
            .filter(|id| id.as_str() == space_id)
            .count()
    }
}

#[async_trait]
impl ConfigStore for MockConfigStore {
    async fn list_spaces(&self) -> BackendResult<Vec<Space>> {
        if let Some(message) = self.fail_spaces.read().clone() {
            return Err(BackendError::Request(message));
        }
        Ok(self.spaces.read().clone())
    }

    async fn list_units(&self, space_id: &str) -> BackendResult<Vec<Unit>> {
        self.list_units_calls.write().push(space_id.to_string());
        if self.fail_units.read().iter().any(|id| id == space_id) {
            return Err(BackendError::Request(format!(
                "simulated listing failure for {}",
                space_id
            )));
        }
        self.units
            .read()
            .get(space_id)
            .cloned()
            .ok_or_else(|| BackendError::UnknownSpace(space_id.to_string()))
    }

    async fn create_record(
        &self,
        space_id: &str,
        payload: &CostRecordPayload,
    ) -> BackendResult<()> {
        self.records
            .write()
            .push((space_id.to_string(), payload.clone()));
        Ok(())
    }
}

/// Mock runtime usage query.
#[derive(Clone, Default)]
pub struct MockUsageSource {
    usage: Arc<RwLock<HashMap<(String, String), ResourceUsage>>>,
    calls: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockUsageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the usage returned for one unit.
    pub fn set_usage(&self, space_id: &str, unit_id: &str, usage: ResourceUsage) {
        self.usage
            .write()
            .insert((space_id.to_string(), unit_id.to_string()), usage);
    }

    /// Units whose usage was queried.
    pub fn queried(&self) -> Vec<(String, String)> {
        self.calls.read().clone()
    }
}

#[async_trait]
impl UsageSource for MockUsageSource {
    async fn unit_usage(&self, space_id: &str, unit_id: &str) -> BackendResult<ResourceUsage> {
        self.calls
            .write()
            .push((space_id.to_string(), unit_id.to_string()));
        self.usage
            .read()
            .get(&(space_id.to_string(), unit_id.to_string()))
            .copied()
            .ok_or_else(|| BackendError::UnknownUnit(unit_id.to_string()))
    }
}
