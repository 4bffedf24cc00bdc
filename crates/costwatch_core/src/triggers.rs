//! Trigger processing: pre-apply and post-apply hook chains.
//!
//! The processor polls on its own cadence, feeds listings through the
//! [`ChangeDetector`] and drives the two ordered hook chains. Hooks are
//! best-effort: a failing hook is logged and neither blocks its siblings nor
//! the poll loop. Post-apply transitions additionally feed a deployment cost
//! record back into the owning [`SpaceMonitor`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use costwatch_assess::{CostEstimator, RiskAssessor};
use costwatch_backend::{ConfigStore, UsageSource};
use costwatch_model::{
    ChangeKind, CostRecordPayload, PendingChange, ResourceUsage, RiskLevel, Unit,
};

use crate::detector::{ChangeDetector, TransitionKind};
use crate::error::CoreResult;
use crate::monitor::SpaceMonitor;
use crate::orchestrator::SharedMonitors;

/// Runs before a pending change is applied, with its predicted impact.
#[async_trait]
pub trait PreApplyHook: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, unit: &Unit, predicted: &PendingChange) -> CoreResult<()>;
}

/// Runs after a change took effect, with the observed resource usage.
#[async_trait]
pub trait PostApplyHook: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, unit: &Unit, usage: &ResourceUsage) -> CoreResult<()>;
}

/// Pre-apply hook persisting advisory cost-warning records for High and
/// Critical changes. The engine's only write to the backend.
pub struct CostWarningHook {
    store: Arc<dyn ConfigStore>,
}

impl CostWarningHook {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PreApplyHook for CostWarningHook {
    fn name(&self) -> &str {
        "cost-warning"
    }

    async fn handle(&self, _unit: &Unit, predicted: &PendingChange) -> CoreResult<()> {
        if predicted.risk.level < RiskLevel::High {
            return Ok(());
        }
        let payload = CostRecordPayload::warning(predicted);
        self.store
            .create_record(&predicted.space_id, &payload)
            .await?;
        info!(
            "Recorded {} cost warning for unit {} (delta ${:.2}/month)",
            predicted.risk.level, predicted.unit_id, predicted.cost_delta
        );
        Ok(())
    }
}

/// Post-apply hook logging observed consumption.
#[derive(Default)]
pub struct UsageLogHook;

#[async_trait]
impl PostApplyHook for UsageLogHook {
    fn name(&self) -> &str {
        "usage-log"
    }

    async fn handle(&self, unit: &Unit, usage: &ResourceUsage) -> CoreResult<()> {
        info!(
            "Unit {} applied: observed {:.2} cores / {:.2} GiB",
            unit.id, usage.cpu_cores, usage.memory_gib
        );
        Ok(())
    }
}

/// Drives the hook lifecycle off observed unit transitions.
pub struct TriggerProcessor {
    store: Arc<dyn ConfigStore>,
    usage: Arc<dyn UsageSource>,
    monitors: SharedMonitors,
    estimator: CostEstimator,
    assessor: RiskAssessor,
    detector: ChangeDetector,
    /// Update timestamp of the last processed pre-apply per unit; suppresses
    /// re-invocation when the observed update time has not advanced.
    last_processed: HashMap<(String, String), DateTime<Utc>>,
    pre_hooks: Vec<Arc<dyn PreApplyHook>>,
    post_hooks: Vec<Arc<dyn PostApplyHook>>,
}

impl TriggerProcessor {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        usage: Arc<dyn UsageSource>,
        monitors: SharedMonitors,
    ) -> Self {
        Self {
            store,
            usage,
            monitors,
            estimator: CostEstimator::new(),
            assessor: RiskAssessor::new(),
            detector: ChangeDetector::new(),
            last_processed: HashMap::new(),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    /// Append a pre-apply hook. Chains are ordered; registration order is
    /// execution order.
    pub fn with_pre_hook(mut self, hook: Arc<dyn PreApplyHook>) -> Self {
        self.pre_hooks.push(hook);
        self
    }

    /// Append a post-apply hook.
    pub fn with_post_hook(mut self, hook: Arc<dyn PostApplyHook>) -> Self {
        self.post_hooks.push(hook);
        self
    }

    /// One poll pass over all known spaces.
    ///
    /// Listing failures are per-space and transient; the space is retried on
    /// the next poll.
    pub async fn poll(&mut self) {
        let monitors: Vec<(String, Arc<tokio::sync::Mutex<SpaceMonitor>>)> = {
            let map = self.monitors.read().await;
            map.iter().map(|(id, m)| (id.clone(), m.clone())).collect()
        };

        for (space_id, monitor) in monitors {
            let units = match self.store.list_units(&space_id).await {
                Ok(units) => units,
                Err(e) => {
                    warn!("Trigger poll: listing units of {} failed: {}", space_id, e);
                    continue;
                }
            };

            let transitions = self.detector.observe(&space_id, &units);
            for transition in transitions {
                match transition.kind {
                    TransitionKind::PendingApply => {
                        self.process_pending_apply(&space_id, &transition.unit, &monitor)
                            .await;
                    }
                    TransitionKind::Applied => {
                        self.process_applied(&space_id, &transition.unit, &monitor)
                            .await;
                    }
                }
            }
        }
    }

    async fn process_pending_apply(
        &mut self,
        space_id: &str,
        unit: &Unit,
        monitor: &Arc<tokio::sync::Mutex<SpaceMonitor>>,
    ) {
        let key = (space_id.to_string(), unit.id.clone());
        if let Some(processed_at) = self.last_processed.get(&key) {
            if *processed_at >= unit.updated_at {
                debug!(
                    "Skipping pre-apply for {}: update time has not advanced",
                    unit.id
                );
                return;
            }
        }

        let predicted = {
            let guard = monitor.lock().await;
            guard
                .pending_changes()
                .iter()
                .find(|c| c.unit_id == unit.id)
                .cloned()
                .unwrap_or_else(|| self.synthesize_change(space_id, unit, &guard))
        };

        for hook in &self.pre_hooks {
            if let Err(e) = hook.handle(unit, &predicted).await {
                warn!("Pre-apply hook {} failed for {}: {}", hook.name(), unit.id, e);
            }
        }
        self.last_processed.insert(key, unit.updated_at);
    }

    async fn process_applied(
        &self,
        space_id: &str,
        unit: &Unit,
        monitor: &Arc<tokio::sync::Mutex<SpaceMonitor>>,
    ) {
        let usage = match self.usage.unit_usage(space_id, &unit.id).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Usage query for applied unit {} failed: {}", unit.id, e);
                return;
            }
        };

        let actual_cost = self.estimator.estimate_usage(&usage);
        monitor.lock().await.record_deployment(&unit.id, actual_cost);

        for hook in &self.post_hooks {
            if let Err(e) = hook.handle(unit, &usage).await {
                warn!("Post-apply hook {} failed for {}: {}", hook.name(), unit.id, e);
            }
        }
    }

    /// Build a predicted impact on the spot when the analysis tick has not
    /// produced one yet. Same pure functions, so the numbers agree.
    fn synthesize_change(
        &self,
        space_id: &str,
        unit: &Unit,
        monitor: &SpaceMonitor,
    ) -> PendingChange {
        let estimate = self.estimator.estimate_unit(unit);
        let kind = if unit.live.is_none() {
            ChangeKind::Create
        } else {
            ChangeKind::Update
        };
        let current_cost = match kind {
            ChangeKind::Create => 0.0,
            ChangeKind::Update => monitor.live_estimate(&unit.id).unwrap_or(0.0),
        };
        let cost_delta = estimate.monthly_cost - current_cost;
        let risk = self.assessor.assess(cost_delta, &unit.labels);
        PendingChange {
            space_id: space_id.to_string(),
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            kind,
            current_cost,
            projected_cost: estimate.monthly_cost,
            cost_delta,
            risk,
            note: estimate.note,
            analyzed_at: Utc::now(),
        }
    }

    /// Poll on the given interval until shutdown flips.
    pub async fn run(
        mut self,
        period: std::time::Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Trigger processor shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_backend::{MockConfigStore, MockUsageSource};
    use costwatch_model::Space;
    use std::collections::HashMap as StdHashMap;
    use tokio::sync::{Mutex, RwLock};

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

    fn shared_monitor(space: Space) -> SharedMonitors {
        let mut map = HashMap::new();
        map.insert(
            space.id.clone(),
            Arc::new(Mutex::new(SpaceMonitor::new(space))),
        );
        Arc::new(RwLock::new(map))
    }

    struct CountingHook {
        calls: Arc<std::sync::atomic::AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl PreApplyHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        async fn handle(&self, _unit: &Unit, _predicted: &PendingChange) -> CoreResult<()> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail {
                Err(crate::error::CoreError::Hook {
                    hook: "counting".to_string(),
                    unit: "u".to_string(),
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn pre_apply_fires_exactly_once_without_changes() {
        let space = Space::new("s1", "team-a");
        let store =
            MockConfigStore::new().with_space(space.clone(), vec![unit("u1", "resources:\n  cpu: 1\n")]);
        let usage = MockUsageSource::new();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut processor = TriggerProcessor::new(
            Arc::new(store),
            Arc::new(usage),
            shared_monitor(space),
        )
        .with_pre_hook(Arc::new(CountingHook {
            calls: calls.clone(),
            fail: false,
        }));

        processor.poll().await;
        processor.poll().await;
        processor.poll().await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_hook_does_not_block_siblings() {
        let space = Space::new("s1", "team-a");
        let store =
            MockConfigStore::new().with_space(space.clone(), vec![unit("u1", "resources:\n  cpu: 1\n")]);
        let first = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let second = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut processor = TriggerProcessor::new(
            Arc::new(store),
            Arc::new(MockUsageSource::new()),
            shared_monitor(space),
        )
        .with_pre_hook(Arc::new(CountingHook {
            calls: first.clone(),
            fail: true,
        }))
        .with_pre_hook(Arc::new(CountingHook {
            calls: second.clone(),
            fail: false,
        }));

        processor.poll().await;
        assert_eq!(first.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(second.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn applied_transition_records_deployment() {
        let space = Space::new("s1", "team-a");
        // 2 cpu, 2 GiB declared: predicted 45.
        let store = MockConfigStore::new().with_space(
            space.clone(),
            vec![unit("u1", "resources:\n  cpu: 2\n  memory: \"2Gi\"\n")],
        );
        let usage = MockUsageSource::new();
        // Observed 2 cores, 2 GiB: actual also 45.
        usage.set_usage(
            "s1",
            "u1",
            ResourceUsage {
                cpu_cores: 2.0,
                memory_gib: 2.0,
            },
        );

        let monitors = shared_monitor(space);
        let monitor = monitors.read().await.get("s1").unwrap().clone();

        // Prime the prediction through an analysis pass.
        {
            let units = store.list_units("s1").await.unwrap();
            monitor.lock().await.analyze(&units);
        }

        let store = Arc::new(store);
        let mut processor =
            TriggerProcessor::new(store.clone(), Arc::new(usage), monitors.clone());

        processor.poll().await; // PendingApply
        store.mark_applied("s1", "u1");
        processor.poll().await; // Applied

        let guard = monitor.lock().await;
        assert_eq!(guard.history().len(), 1);
        let record = guard.history().back().unwrap();
        assert!((record.predicted_cost - 45.0).abs() < f64::EPSILON);
        assert!((record.actual_cost - 45.0).abs() < f64::EPSILON);
        assert!(record.accurate);
    }

    #[tokio::test]
    async fn analysis_between_apply_and_poll_keeps_prediction() {
        let space = Space::new("s1", "team-a");
        let store = MockConfigStore::new().with_space(
            space.clone(),
            vec![unit("u1", "resources:\n  cpu: 2\n  memory: \"2Gi\"\n")],
        );
        let usage = MockUsageSource::new();
        usage.set_usage(
            "s1",
            "u1",
            ResourceUsage {
                cpu_cores: 2.0,
                memory_gib: 2.0,
            },
        );

        let monitors = shared_monitor(space);
        let monitor = monitors.read().await.get("s1").unwrap().clone();
        {
            let units = store.list_units("s1").await.unwrap();
            monitor.lock().await.analyze(&units);
        }

        let store = Arc::new(store);
        let mut processor =
            TriggerProcessor::new(store.clone(), Arc::new(usage), monitors.clone());

        processor.poll().await; // PendingApply
        store.mark_applied("s1", "u1");

        // An analysis tick lands before the poll observes the apply.
        {
            let units = store.list_units("s1").await.unwrap();
            monitor.lock().await.analyze(&units);
        }

        processor.poll().await; // Applied

        let guard = monitor.lock().await;
        let record = guard.history().back().unwrap();
        assert!((record.predicted_cost - 45.0).abs() < f64::EPSILON);
        assert!(record.accurate);
    }

    #[tokio::test]
    async fn high_risk_pending_change_persists_cost_warning() {
        let space = Space::new("s1", "team-a");
        // 40 cpu: projected 605, critical.
        let store = MockConfigStore::new()
            .with_space(space.clone(), vec![unit("big", "resources:\n  cpu: 40\n")]);
        let store = Arc::new(store);

        let mut processor = TriggerProcessor::new(
            store.clone(),
            Arc::new(MockUsageSource::new()),
            shared_monitor(space),
        )
        .with_pre_hook(Arc::new(CostWarningHook::new(store.clone())));

        processor.poll().await;

        let records = store.recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "s1");
        assert_eq!(records[0].1.kind, "cost-warning");
        assert_eq!(records[0].1.unit_id, "big");
    }

    #[tokio::test]
    async fn low_risk_change_writes_no_warning() {
        let space = Space::new("s1", "team-a");
        let store = MockConfigStore::new()
            .with_space(space.clone(), vec![unit("small", "resources:\n  cpu: 1\n")]);
        let store = Arc::new(store);

        let mut processor = TriggerProcessor::new(
            store.clone(),
            Arc::new(MockUsageSource::new()),
            shared_monitor(space),
        )
        .with_pre_hook(Arc::new(CostWarningHook::new(store.clone())));

        processor.poll().await;
        assert!(store.recorded().is_empty());
    }

    #[tokio::test]
    async fn usage_failure_skips_record_but_not_poll() {
        let space = Space::new("s1", "team-a");
        let store = MockConfigStore::new()
            .with_space(space.clone(), vec![unit("u1", "resources:\n  cpu: 1\n")]);
        let store = Arc::new(store);
        let monitors = shared_monitor(space);

        // No usage scripted: the query fails for every unit.
        let mut processor = TriggerProcessor::new(
            store.clone(),
            Arc::new(MockUsageSource::new()),
            monitors.clone(),
        );

        processor.poll().await;
        store.mark_applied("s1", "u1");
        processor.poll().await;

        let monitor = monitors.read().await.get("s1").unwrap().clone();
        assert!(monitor.lock().await.history().is_empty());
    }
}
