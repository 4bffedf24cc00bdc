//! The orchestrator: space discovery, concurrent analysis, snapshots.
//!
//! [`CostImpactMonitor`] owns the space-id → [`SpaceMonitor`] map under one
//! read-write lock. Every tick it re-syncs the map against the backend's
//! space list, fans out one analysis task per space, and commits a
//! [`GlobalSnapshot`] for the read path. A single space's failure never
//! fails the tick; that space keeps its last-known values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use costwatch_assess::{narrate_change, Advisor};
use costwatch_backend::ConfigStore;
use costwatch_model::{GlobalSnapshot, PendingChange, RiskLevel, SpaceSnapshot};

use crate::error::{CoreError, CoreResult};
use crate::monitor::SpaceMonitor;

/// The orchestrator-level registry: one monitor per known space.
pub type SharedMonitors = Arc<RwLock<HashMap<String, Arc<Mutex<SpaceMonitor>>>>>;

/// Fleet-wide cost-impact orchestrator.
pub struct CostImpactMonitor {
    store: Arc<dyn ConfigStore>,
    advisor: Arc<dyn Advisor>,
    monitors: SharedMonitors,
    last_snapshot: Arc<RwLock<Option<GlobalSnapshot>>>,
    prune_stale: bool,
    synced_once: AtomicBool,
}

impl CostImpactMonitor {
    pub fn new(store: Arc<dyn ConfigStore>, advisor: Arc<dyn Advisor>) -> Self {
        Self {
            store,
            advisor,
            monitors: Arc::new(RwLock::new(HashMap::new())),
            last_snapshot: Arc::new(RwLock::new(None)),
            prune_stale: true,
            synced_once: AtomicBool::new(false),
        }
    }

    /// Keep monitors for spaces the backend no longer reports.
    pub fn keep_stale_spaces(mut self) -> Self {
        self.prune_stale = false;
        self
    }

    /// Handle to the registry, shared with the trigger processor.
    pub fn monitors(&self) -> SharedMonitors {
        self.monitors.clone()
    }

    /// Diff the backend's space list against the known map.
    ///
    /// The very first sync failing is the one hard startup error: zero
    /// discoverable spaces means the backend is unreachable. Later failures
    /// are transient; the known map is kept and the call retried next tick.
    pub async fn sync_spaces(&self) -> CoreResult<usize> {
        let spaces = match self.store.list_spaces().await {
            Ok(spaces) => spaces,
            Err(e) => {
                if self.synced_once.load(Ordering::SeqCst) {
                    return Err(e.into());
                }
                return Err(CoreError::NoSpacesDiscovered(e.to_string()));
            }
        };
        self.synced_once.store(true, Ordering::SeqCst);

        let mut map = self.monitors.write().await;
        for space in &spaces {
            match map.get(&space.id) {
                Some(monitor) => {
                    monitor.lock().await.set_space_name(&space.name);
                }
                None => {
                    info!("Discovered space {} ({})", space.id, space.name);
                    map.insert(
                        space.id.clone(),
                        Arc::new(Mutex::new(SpaceMonitor::new(space.clone()))),
                    );
                }
            }
        }

        if self.prune_stale {
            let listed: Vec<&str> = spaces.iter().map(|s| s.id.as_str()).collect();
            map.retain(|id, _| {
                let keep = listed.contains(&id.as_str());
                if !keep {
                    info!("Space {} no longer reported; dropping monitor", id);
                }
                keep
            });
        }

        Ok(map.len())
    }

    /// Analyze every known space concurrently and commit a global snapshot.
    pub async fn monitor_all_spaces(&self) -> CoreResult<GlobalSnapshot> {
        let monitors: Vec<(String, Arc<Mutex<SpaceMonitor>>)> = {
            let map = self.monitors.read().await;
            map.iter().map(|(id, m)| (id.clone(), m.clone())).collect()
        };

        let mut tasks = JoinSet::new();
        for (space_id, monitor) in monitors {
            let store = self.store.clone();
            let advisor = self.advisor.clone();
            tasks.spawn(async move {
                analyze_space(space_id, monitor, store, advisor).await
            });
        }

        let mut spaces = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(snapshot) => spaces.push(snapshot),
                Err(e) => error!("Space analysis task panicked: {}", e),
            }
        }
        spaces.sort_by(|a, b| a.space_id.cmp(&b.space_id));

        let snapshot = GlobalSnapshot {
            computed_at: Utc::now(),
            total_cost: spaces.iter().map(|s| s.current_cost).sum(),
            projected_cost: spaces.iter().map(|s| s.projected_cost).sum(),
            pending_change_count: spaces.iter().map(|s| s.pending_changes.len()).sum(),
            high_risk_count: spaces
                .iter()
                .flat_map(|s| &s.pending_changes)
                .filter(|c| c.risk.level >= RiskLevel::High)
                .count(),
            spaces,
        };

        *self.last_snapshot.write().await = Some(snapshot.clone());
        debug!(
            "Committed snapshot: {} spaces, ${:.2} current, ${:.2} projected, {} pending",
            snapshot.spaces.len(),
            snapshot.total_cost,
            snapshot.projected_cost,
            snapshot.pending_change_count
        );
        Ok(snapshot)
    }

    /// One full tick: re-sync the space list, then analyze everything.
    ///
    /// Besides the interval loop, embedders may call this directly on
    /// external change notifications from the orchestration runtime.
    pub async fn tick(&self) -> CoreResult<GlobalSnapshot> {
        match self.sync_spaces().await {
            Ok(count) => debug!("Space sync: {} monitored", count),
            Err(e @ CoreError::NoSpacesDiscovered(_)) => return Err(e),
            Err(e) => warn!("Space sync failed, keeping known spaces: {}", e),
        }
        self.monitor_all_spaces().await
    }

    /// Last fully committed snapshot, if any tick has completed.
    pub async fn snapshot(&self) -> Option<GlobalSnapshot> {
        self.last_snapshot.read().await.clone()
    }

    /// All pending changes of the last committed snapshot.
    pub async fn pending_changes(&self) -> Vec<PendingChange> {
        match self.last_snapshot.read().await.as_ref() {
            Some(snapshot) => snapshot
                .spaces
                .iter()
                .flat_map(|s| s.pending_changes.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Tick on a fixed interval until shutdown flips. Returns an error only
    /// for the startup hard failure; in-flight work finishes before exit.
    pub async fn run(
        &self,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> CoreResult<()> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(_) => {}
                        Err(e @ CoreError::NoSpacesDiscovered(_)) => {
                            error!("{}", e);
                            return Err(e);
                        }
                        Err(e) => warn!("Analysis tick failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Cost impact monitor shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Analyze one space; on listing failure keep last-known values.
async fn analyze_space(
    space_id: String,
    monitor: Arc<Mutex<SpaceMonitor>>,
    store: Arc<dyn ConfigStore>,
    advisor: Arc<dyn Advisor>,
) -> SpaceSnapshot {
    let units = match store.list_units(&space_id).await {
        Ok(units) => units,
        Err(e) => {
            warn!(
                "Analysis of space {} failed, retaining last-known values: {}",
                space_id, e
            );
            return monitor.lock().await.snapshot();
        }
    };

    // Analyze under the lock, narrate outside it: the advisor call is slow
    // and must not stall snapshot readers.
    let top_change = {
        let mut guard = monitor.lock().await;
        guard.analyze(&units);
        guard.highest_risk_pending().cloned()
    };

    if let Some(change) = top_change {
        if let Some(narrative) = narrate_change(advisor.as_ref(), &change).await {
            monitor
                .lock()
                .await
                .set_narrative(&change.unit_id, narrative);
        }
    }

    monitor.lock().await.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_assess::NoopAdvisor;
    use costwatch_backend::MockConfigStore;
    use costwatch_model::{Space, Unit};
    use std::collections::HashMap as StdHashMap;

    fn unit(id: &str, manifest: &str) -> Unit {
        Unit {
            id: id.to_string(),
            name: id.to_string(),
            labels: StdHashMap::new(),
            revision: "r1".to_string(),
            updated_at: Utc::now(),
            live: None,
            manifest: manifest.to_string(),
        }
    }

    fn orchestrator(store: MockConfigStore) -> CostImpactMonitor {
        CostImpactMonitor::new(Arc::new(store), Arc::new(NoopAdvisor))
    }

    #[tokio::test]
    async fn discovery_adds_and_prunes_monitors() {
        let store = MockConfigStore::new()
            .with_space(Space::new("s1", "team-a"), vec![])
            .with_space(Space::new("s2", "team-b"), vec![]);
        let store_handle = store.clone();
        let orchestrator = orchestrator(store);

        assert_eq!(orchestrator.sync_spaces().await.unwrap(), 2);

        store_handle.set_spaces(vec![Space::new("s2", "team-b")]);
        assert_eq!(orchestrator.sync_spaces().await.unwrap(), 1);
        assert!(orchestrator.monitors().read().await.contains_key("s2"));
    }

    #[tokio::test]
    async fn first_sync_failure_is_fatal_later_ones_are_not() {
        let store = MockConfigStore::new().with_space(Space::new("s1", "team-a"), vec![]);
        let store_handle = store.clone();
        let orchestrator = orchestrator(store);

        store_handle.fail_list_spaces("connection refused");
        match orchestrator.sync_spaces().await {
            Err(CoreError::NoSpacesDiscovered(_)) => {}
            other => panic!("expected NoSpacesDiscovered, got {:?}", other.map(|_| ())),
        }

        store_handle.restore_list_spaces();
        assert_eq!(orchestrator.sync_spaces().await.unwrap(), 1);

        store_handle.fail_list_spaces("flaky");
        match orchestrator.sync_spaces().await {
            Err(CoreError::Backend(_)) => {}
            other => panic!("expected Backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn snapshot_aggregates_across_spaces() {
        let store = MockConfigStore::new()
            .with_space(
                Space::new("s1", "team-a"),
                vec![unit("a", "resources:\n  cpu: 2\n  memory: \"2Gi\"\n")],
            )
            .with_space(
                Space::new("s2", "team-b"),
                vec![unit("b", "resources:\n  cpu: 40\n")],
            );
        let orchestrator = orchestrator(store);

        let snapshot = orchestrator.tick().await.unwrap();
        assert_eq!(snapshot.spaces.len(), 2);
        assert_eq!(snapshot.pending_change_count, 2);
        // cpu 40 → $605 delta → critical.
        assert_eq!(snapshot.high_risk_count, 1);
        assert_eq!(snapshot.total_cost, 0.0);
        assert!((snapshot.projected_cost - (45.0 + 605.0)).abs() < 1e-9);

        let read_back = orchestrator.snapshot().await.unwrap();
        assert_eq!(read_back, snapshot);
        assert_eq!(orchestrator.pending_changes().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_space_keeps_last_known_values() {
        let store = MockConfigStore::new()
            .with_space(
                Space::new("s1", "team-a"),
                vec![unit("a", "resources:\n  cpu: 2\n")],
            )
            .with_space(
                Space::new("s2", "team-b"),
                vec![unit("b", "resources:\n  cpu: 1\n")],
            );
        let store_handle = store.clone();
        let orchestrator = orchestrator(store);

        let first = orchestrator.tick().await.unwrap();
        let s1_before = first
            .spaces
            .iter()
            .find(|s| s.space_id == "s1")
            .unwrap()
            .clone();

        store_handle.fail_list_units("s1");
        let second = orchestrator.tick().await.unwrap();
        assert_eq!(second.spaces.len(), 2);

        let s1_after = second.spaces.iter().find(|s| s.space_id == "s1").unwrap();
        assert_eq!(s1_after.projected_cost, s1_before.projected_cost);
        assert_eq!(s1_after.pending_changes, s1_before.pending_changes);
    }

    #[tokio::test]
    async fn snapshot_is_none_before_first_tick() {
        let store = MockConfigStore::new().with_space(Space::new("s1", "team-a"), vec![]);
        let orchestrator = orchestrator(store);
        assert!(orchestrator.snapshot().await.is_none());
        assert!(orchestrator.pending_changes().await.is_empty());
    }
}
