//! Per-space cost state.
//!
//! A [`SpaceMonitor`] owns everything the engine knows about one space:
//! current and projected cost, the pending changes of the last analysis,
//! a bounded deployment history and the derived cost trend. Each monitor is
//! written by exactly one analysis task per tick; the orchestrator wraps it
//! in a lock for the snapshot readers.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use costwatch_assess::{CostEstimator, RiskAssessor};
use costwatch_model::{
    ChangeKind, CostTrend, DeploymentCostRecord, PendingChange, Space, SpaceSnapshot, Unit,
    DEPLOYMENT_HISTORY_CAP,
};

/// Mutable cost state for one space.
pub struct SpaceMonitor {
    space: Space,
    estimator: CostEstimator,
    assessor: RiskAssessor,
    current_cost: f64,
    projected_cost: f64,
    pending: Vec<PendingChange>,
    /// Last estimate of each unit observed live, keyed by unit id. Gives the
    /// "current" side of an update-kind delta after the unit drifts pending.
    live_estimates: HashMap<String, f64>,
    /// Last projected cost per unit seen pending; the prediction a deployment
    /// is later compared against. Entries outlive the pending state and are
    /// consumed by the deployment record.
    predicted: HashMap<String, f64>,
    history: VecDeque<DeploymentCostRecord>,
    trend: Option<CostTrend>,
    analyzed_at: DateTime<Utc>,
}

impl SpaceMonitor {
    pub fn new(space: Space) -> Self {
        Self {
            space,
            estimator: CostEstimator::new(),
            assessor: RiskAssessor::new(),
            current_cost: 0.0,
            projected_cost: 0.0,
            pending: Vec::new(),
            live_estimates: HashMap::new(),
            predicted: HashMap::new(),
            history: VecDeque::new(),
            trend: None,
            analyzed_at: Utc::now(),
        }
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Keep the display name in sync with the backend.
    pub fn set_space_name(&mut self, name: &str) {
        if self.space.name != name {
            self.space.name = name.to_string();
        }
    }

    pub fn current_cost(&self) -> f64 {
        self.current_cost
    }

    pub fn projected_cost(&self) -> f64 {
        self.projected_cost
    }

    pub fn pending_changes(&self) -> &[PendingChange] {
        &self.pending
    }

    pub fn history(&self) -> &VecDeque<DeploymentCostRecord> {
        &self.history
    }

    pub fn trend(&self) -> Option<CostTrend> {
        self.trend
    }

    /// Recompute the space's full derived state from one consistent unit
    /// listing. Idempotent given identical input and history.
    pub fn analyze(&mut self, units: &[Unit]) {
        let now = Utc::now();
        let mut current_cost = 0.0;
        let mut pending = Vec::with_capacity(units.len());
        let mut predicted = HashMap::new();

        for unit in units {
            let estimate = self.estimator.estimate_unit(unit);

            if !unit.is_pending() {
                current_cost += estimate.monthly_cost;
                self.live_estimates
                    .insert(unit.id.clone(), estimate.monthly_cost);
                continue;
            }

            let kind = if unit.live.is_none() {
                ChangeKind::Create
            } else {
                ChangeKind::Update
            };
            let unit_current = match kind {
                ChangeKind::Create => 0.0,
                ChangeKind::Update => self.live_estimates.get(&unit.id).copied().unwrap_or(0.0),
            };
            let cost_delta = estimate.monthly_cost - unit_current;
            let risk = self.assessor.assess(cost_delta, &unit.labels);

            predicted.insert(unit.id.clone(), estimate.monthly_cost);
            pending.push(PendingChange {
                space_id: self.space.id.clone(),
                unit_id: unit.id.clone(),
                unit_name: unit.name.clone(),
                kind,
                current_cost: unit_current,
                projected_cost: estimate.monthly_cost,
                cost_delta,
                risk,
                note: estimate.note,
                analyzed_at: now,
            });
        }

        self.current_cost = current_cost;
        self.projected_cost =
            current_cost + pending.iter().map(|c| c.cost_delta).sum::<f64>();
        self.pending = pending;
        // A unit can go live between two polls; its prediction must survive
        // any analysis tick landing in that window, so merge rather than
        // replace. Units deleted from the space are dropped outright.
        self.predicted.extend(predicted);
        let listed: HashSet<&str> = units.iter().map(|u| u.id.as_str()).collect();
        self.predicted.retain(|id, _| listed.contains(id.as_str()));
        self.live_estimates.retain(|id, _| listed.contains(id.as_str()));
        self.recompute_trend();
        self.analyzed_at = now;

        debug!(
            "Analyzed space {}: current ${:.2}, projected ${:.2}, {} pending",
            self.space.id,
            self.current_cost,
            self.projected_cost,
            self.pending.len()
        );
    }

    /// Record an observed deployment, comparing actual cost to the last
    /// prediction for the unit. History is capped; the oldest record falls
    /// out first.
    pub fn record_deployment(&mut self, unit_id: &str, actual_cost: f64) {
        let predicted = self
            .predicted
            .remove(unit_id)
            .or_else(|| self.live_estimates.get(unit_id).copied())
            .unwrap_or(0.0);
        let record = DeploymentCostRecord::new(unit_id, Utc::now(), predicted, actual_cost);
        debug!(
            "Deployment of {} in {}: predicted ${:.2}, actual ${:.2}, variance {:.1}%",
            unit_id, self.space.id, record.predicted_cost, record.actual_cost, record.variance_pct
        );
        self.history.push_back(record);
        while self.history.len() > DEPLOYMENT_HISTORY_CAP {
            self.history.pop_front();
        }
        self.recompute_trend();
    }

    /// Prediction currently on file for a unit, if any.
    pub fn predicted_cost(&self, unit_id: &str) -> Option<f64> {
        self.predicted.get(unit_id).copied()
    }

    /// Last estimate of a unit observed live, if any.
    pub fn live_estimate(&self, unit_id: &str) -> Option<f64> {
        self.live_estimates.get(unit_id).copied()
    }

    /// The riskiest pending change of the last analysis, ties broken by
    /// larger absolute delta.
    pub fn highest_risk_pending(&self) -> Option<&PendingChange> {
        self.pending.iter().max_by(|a, b| {
            (a.risk.level, a.cost_delta.abs())
                .partial_cmp(&(b.risk.level, b.cost_delta.abs()))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Attach advisor narrative to one pending change. Numbers are final by
    /// the time this runs.
    pub fn set_narrative(&mut self, unit_id: &str, narrative: String) {
        if let Some(change) = self.pending.iter_mut().find(|c| c.unit_id == unit_id) {
            change.risk.narrative = Some(narrative);
        }
    }

    /// Read-only view for snapshot assembly.
    pub fn snapshot(&self) -> SpaceSnapshot {
        SpaceSnapshot {
            space_id: self.space.id.clone(),
            space_name: self.space.name.clone(),
            current_cost: self.current_cost,
            projected_cost: self.projected_cost,
            pending_changes: self.pending.clone(),
            trend: self.trend,
            analyzed_at: self.analyzed_at,
        }
    }

    fn recompute_trend(&mut self) {
        let len = self.history.len();
        self.trend = if len >= 2 {
            let previous = self.history[len - 2].actual_cost;
            let latest = self.history[len - 1].actual_cost;
            Some(CostTrend::between(previous, latest))
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwatch_model::{LiveState, LiveStatus, RiskLevel, TrendDirection};
    use std::collections::HashMap as StdHashMap;

    fn space() -> Space {
        Space::new("s1", "team-a")
    }

    fn unit(id: &str, manifest: &str, live: Option<LiveStatus>) -> Unit {
        Unit {
            id: id.to_string(),
            name: id.to_string(),
            labels: StdHashMap::new(),
            revision: "r1".to_string(),
            updated_at: Utc::now(),
            live,
            manifest: manifest.to_string(),
        }
    }

    fn applied(revision: &str) -> Option<LiveStatus> {
        Some(LiveStatus {
            state: LiveState::Applied,
            revision: revision.to_string(),
            applied_at: Some(Utc::now()),
        })
    }

    #[test]
    fn projected_cost_invariant_holds_after_analyze() {
        let mut monitor = SpaceMonitor::new(space());
        let units = vec![
            unit("live", "resources:\n  cpu: 1\n  memory: \"1Gi\"\n", applied("r1")),
            unit("new-a", "resources:\n  cpu: 2\n  memory: \"2Gi\"\n", None),
            unit("new-b", "resources:\n  cpu: 4\n  memory: \"8Gi\"\n", None),
        ];
        monitor.analyze(&units);

        let delta_sum: f64 = monitor.pending_changes().iter().map(|c| c.cost_delta).sum();
        assert!(
            (monitor.projected_cost() - (monitor.current_cost() + delta_sum)).abs() < 1e-9
        );
        assert_eq!(monitor.pending_changes().len(), 2);
    }

    #[test]
    fn analyze_is_idempotent_for_identical_listing() {
        let mut monitor = SpaceMonitor::new(space());
        let units = vec![
            unit("live", "resources:\n  cpu: 1\n", applied("r1")),
            unit("new", "resources:\n  cpu: 2\n", None),
        ];
        monitor.analyze(&units);
        let first: Vec<_> = monitor
            .pending_changes()
            .iter()
            .map(|c| (c.unit_id.clone(), c.kind, c.current_cost, c.cost_delta, c.risk.level))
            .collect();
        let (cur, proj) = (monitor.current_cost(), monitor.projected_cost());

        monitor.analyze(&units);
        let second: Vec<_> = monitor
            .pending_changes()
            .iter()
            .map(|c| (c.unit_id.clone(), c.kind, c.current_cost, c.cost_delta, c.risk.level))
            .collect();

        assert_eq!(first, second);
        assert_eq!(cur, monitor.current_cost());
        assert_eq!(proj, monitor.projected_cost());
    }

    #[test]
    fn not_yet_live_unit_is_a_create_with_full_delta() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.analyze(&[unit(
            "frontend",
            "resources:\n  cpu: 2\n  memory: \"2Gi\"\n",
            None,
        )]);

        let change = &monitor.pending_changes()[0];
        assert_eq!(change.kind, ChangeKind::Create);
        assert_eq!(change.current_cost, 0.0);
        assert!((change.cost_delta - change.projected_cost).abs() < f64::EPSILON);
        assert!(change.projected_cost > 0.0);
    }

    #[test]
    fn update_delta_uses_cached_live_estimate() {
        let mut monitor = SpaceMonitor::new(space());

        // First tick: unit is live at 1 cpu.
        monitor.analyze(&[unit("api", "resources:\n  cpu: 1\n", applied("r1"))]);
        let live_cost = monitor.current_cost();
        assert!(live_cost > 0.0);

        // Re-edit: same unit, bigger manifest, runtime still on r1.
        let mut edited = unit("api", "resources:\n  cpu: 4\n", applied("r1"));
        edited.revision = "r2".to_string();
        monitor.analyze(&[edited]);

        let change = &monitor.pending_changes()[0];
        assert_eq!(change.kind, ChangeKind::Update);
        assert!((change.current_cost - live_cost).abs() < f64::EPSILON);
        assert!(change.cost_delta > 0.0);
    }

    #[test]
    fn malformed_unit_degrades_to_zero_cost_low_risk() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.analyze(&[
            unit("ok", "resources:\n  cpu: 1\n", None),
            unit("broken", ": not yaml [", None),
        ]);

        assert_eq!(monitor.pending_changes().len(), 2);
        let broken = monitor
            .pending_changes()
            .iter()
            .find(|c| c.unit_id == "broken")
            .unwrap();
        assert_eq!(broken.projected_cost, 0.0);
        assert_eq!(broken.cost_delta, 0.0);
        assert_eq!(broken.risk.level, RiskLevel::Low);
        assert!(broken.note.is_some());
    }

    #[test]
    fn history_is_capped_fifo_at_one_hundred() {
        let mut monitor = SpaceMonitor::new(space());
        for i in 0..150 {
            monitor.record_deployment("u1", f64::from(i));
        }
        assert_eq!(monitor.history().len(), 100);
        // Oldest 50 evicted; the front is the 51st record.
        assert_eq!(monitor.history().front().unwrap().actual_cost, 50.0);
        assert_eq!(monitor.history().back().unwrap().actual_cost, 149.0);
    }

    #[test]
    fn record_deployment_compares_against_prediction() {
        let mut monitor = SpaceMonitor::new(space());
        // Prime a prediction of $950 via a pending unit: 60 cpu → 900 + 45... use
        // explicit manifest: cpu 63, memory 0 → 63*15 + 5 = 950.
        monitor.analyze(&[unit("api", "resources:\n  cpu: 63\n", None)]);
        assert_eq!(monitor.predicted_cost("api"), Some(950.0));

        monitor.record_deployment("api", 935.0);
        let record = monitor.history().back().unwrap();
        assert!((record.variance_pct + 1.578_947).abs() < 1e-3);
        assert!(record.accurate);
    }

    #[test]
    fn prediction_survives_analysis_after_unit_goes_live() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.analyze(&[unit(
            "api",
            "resources:\n  cpu: 2\n  memory: \"2Gi\"\n",
            None,
        )]);
        assert_eq!(monitor.predicted_cost("api"), Some(45.0));

        // The unit goes live and an analysis tick lands before the trigger
        // poll observes the apply.
        monitor.analyze(&[unit(
            "api",
            "resources:\n  cpu: 2\n  memory: \"2Gi\"\n",
            applied("r1"),
        )]);

        monitor.record_deployment("api", 45.0);
        let record = monitor.history().back().unwrap();
        assert!((record.predicted_cost - 45.0).abs() < f64::EPSILON);
        assert!(record.accurate);
        // The record consumed the prediction.
        assert_eq!(monitor.predicted_cost("api"), None);
    }

    #[test]
    fn deleted_units_are_pruned_from_cached_estimates() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.analyze(&[
            unit("keep", "resources:\n  cpu: 1\n", applied("r1")),
            unit("gone", "resources:\n  cpu: 1\n", applied("r1")),
            unit("tmp", "resources:\n  cpu: 1\n", None),
        ]);
        assert!(monitor.live_estimate("gone").is_some());
        assert!(monitor.predicted_cost("tmp").is_some());

        monitor.analyze(&[unit("keep", "resources:\n  cpu: 1\n", applied("r1"))]);
        assert!(monitor.live_estimate("gone").is_none());
        assert!(monitor.predicted_cost("tmp").is_none());
        assert!(monitor.live_estimate("keep").is_some());
    }

    #[test]
    fn two_records_produce_a_trend() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.record_deployment("u1", 1000.0);
        assert!(monitor.trend().is_none());

        monitor.record_deployment("u1", 1500.0);
        let trend = monitor.trend().unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.weekly_delta_pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn highest_risk_pending_prefers_level_then_magnitude() {
        let mut monitor = SpaceMonitor::new(space());
        monitor.analyze(&[
            unit("small", "resources:\n  cpu: 1\n", None),
            unit("big", "resources:\n  cpu: 40\n", None),
        ]);
        assert_eq!(monitor.highest_risk_pending().unwrap().unit_id, "big");
    }
}
