//! Risk assessment for pending cost changes.
//!
//! Deterministic thresholds on the absolute monthly cost delta, with a
//! production-label override. The AI advisor may append narrative text
//! afterwards but never touches the level or the approval flag.

use std::collections::HashMap;

use costwatch_model::{RiskAssessment, RiskLevel};

/// Cost delta thresholds, in dollars per month.
const LOW_THRESHOLD: f64 = 50.0;
const MEDIUM_THRESHOLD: f64 = 200.0;
const HIGH_THRESHOLD: f64 = 500.0;

/// Label keys whose value marks a production-like context.
const ENVIRONMENT_KEYS: [&str; 3] = ["environment", "env", "tier"];

/// Pure risk scorer. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAssessor;

impl RiskAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Score a cost delta against its context labels.
    ///
    /// `|delta|` maps to low/medium/high/critical at 50/200/500. A
    /// production-like label escalates a low verdict one step and always
    /// clears auto-approval.
    pub fn assess(&self, cost_delta: f64, labels: &HashMap<String, String>) -> RiskAssessment {
        let magnitude = cost_delta.abs();
        let mut level = if magnitude < LOW_THRESHOLD {
            RiskLevel::Low
        } else if magnitude < MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else if magnitude < HIGH_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        };

        let production = is_production(labels);
        if production && level == RiskLevel::Low {
            level = level.escalate();
        }

        RiskAssessment {
            level,
            recommendation: recommendation_for(level, cost_delta, production),
            auto_approve: level == RiskLevel::Low && !production,
            narrative: None,
        }
    }
}

/// Whether the labels mark a production-like context.
pub fn is_production(labels: &HashMap<String, String>) -> bool {
    if labels.keys().any(|k| k.eq_ignore_ascii_case("production")) {
        return true;
    }
    labels.iter().any(|(key, value)| {
        ENVIRONMENT_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
            && (value.eq_ignore_ascii_case("production") || value.eq_ignore_ascii_case("prod"))
    })
}

fn recommendation_for(level: RiskLevel, cost_delta: f64, production: bool) -> String {
    let direction = if cost_delta >= 0.0 { "increase" } else { "decrease" };
    match level {
        RiskLevel::Low => {
            if production {
                format!(
                    "Minor cost {} in a production context; review before applying",
                    direction
                )
            } else {
                format!("Minor cost {}; safe to apply", direction)
            }
        }
        RiskLevel::Medium => format!(
            "Moderate cost {} (${:.2}/month); review before applying",
            direction,
            cost_delta.abs()
        ),
        RiskLevel::High => format!(
            "Significant cost {} (${:.2}/month); requires approval",
            direction,
            cost_delta.abs()
        ),
        RiskLevel::Critical => format!(
            "Critical cost {} (${:.2}/month); requires explicit sign-off",
            direction,
            cost_delta.abs()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn levels_follow_thresholds() {
        let assessor = RiskAssessor::new();
        let none = HashMap::new();
        assert_eq!(assessor.assess(49.0, &none).level, RiskLevel::Low);
        assert_eq!(assessor.assess(50.0, &none).level, RiskLevel::Medium);
        assert_eq!(assessor.assess(199.0, &none).level, RiskLevel::Medium);
        assert_eq!(assessor.assess(200.0, &none).level, RiskLevel::High);
        assert_eq!(assessor.assess(499.0, &none).level, RiskLevel::High);
        assert_eq!(assessor.assess(500.0, &none).level, RiskLevel::Critical);
    }

    #[test]
    fn level_is_monotone_in_magnitude() {
        let assessor = RiskAssessor::new();
        let none = HashMap::new();
        let deltas = [0.0, 10.0, 49.9, 50.0, 150.0, 200.0, 499.0, 500.0, 5000.0];
        let mut previous = RiskLevel::Low;
        for delta in deltas {
            let level = assessor.assess(delta, &none).level;
            assert!(level >= previous, "level regressed at delta {}", delta);
            previous = level;
        }
    }

    #[test]
    fn negative_deltas_use_magnitude() {
        let assessor = RiskAssessor::new();
        let none = HashMap::new();
        assert_eq!(assessor.assess(-600.0, &none).level, RiskLevel::Critical);
        assert_eq!(assessor.assess(-30.0, &none).level, RiskLevel::Low);
    }

    #[test]
    fn production_label_escalates_low_and_blocks_auto_approve() {
        let assessor = RiskAssessor::new();
        let prod = labels(&[("environment", "production")]);

        let verdict = assessor.assess(10.0, &prod);
        assert_eq!(verdict.level, RiskLevel::Medium);
        assert!(!verdict.auto_approve);

        // Magnitude-driven level beyond low is unchanged but never auto-approved.
        let verdict = assessor.assess(2400.0, &prod);
        assert_eq!(verdict.level, RiskLevel::Critical);
        assert!(!verdict.auto_approve);
    }

    #[test]
    fn production_detection_variants() {
        assert!(is_production(&labels(&[("env", "prod")])));
        assert!(is_production(&labels(&[("tier", "Production")])));
        assert!(is_production(&labels(&[("production", "true")])));
        assert!(!is_production(&labels(&[("environment", "staging")])));
        assert!(!is_production(&HashMap::new()));
    }

    #[test]
    fn auto_approve_only_for_low_outside_production() {
        let assessor = RiskAssessor::new();
        let none = HashMap::new();
        assert!(assessor.assess(10.0, &none).auto_approve);
        assert!(!assessor.assess(100.0, &none).auto_approve);
        assert!(!assessor.assess(10.0, &labels(&[("env", "prod")])).auto_approve);
    }
}
