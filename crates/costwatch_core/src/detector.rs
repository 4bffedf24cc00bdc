//! Unit change detection.
//!
//! Tracks per-unit observation state across trigger polls and emits
//! transitions for the processor to act on. The state machine per unit:
//!
//! ```text
//! Unseen → PendingApply → Applied → PendingApply (on re-edit)
//! ```
//!
//! The cache is in-memory only; losing it re-fires advisory transitions after
//! a restart (at-least-once, accepted).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use costwatch_model::Unit;

/// Which edge of the state machine a unit just crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// First observation, or a newer revision/update timestamp than cached.
    PendingApply,
    /// The unit's reported live status flipped to applied at its revision.
    Applied,
}

/// One observed transition, carrying the unit as listed when it was seen.
#[derive(Debug, Clone)]
pub struct UnitTransition {
    pub space_id: String,
    pub unit: Unit,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone)]
struct UnitCache {
    revision: String,
    updated_at: DateTime<Utc>,
    applied: bool,
}

/// Polls-to-transitions state machine over (space, unit) keys.
#[derive(Default)]
pub struct ChangeDetector {
    seen: HashMap<(String, String), UnitCache>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one consistent unit listing for a space; emit the transitions
    /// since the previous observation. Cache entries for units no longer
    /// listed are dropped.
    pub fn observe(&mut self, space_id: &str, units: &[Unit]) -> Vec<UnitTransition> {
        let mut transitions = Vec::new();

        for unit in units {
            let key = (space_id.to_string(), unit.id.clone());
            let applied_now = !unit.is_pending();

            match self.seen.get_mut(&key) {
                None => {
                    // Unseen → PendingApply on first observation. Seeding the
                    // applied flag from the listing keeps a unit discovered
                    // already live from faking an apply on the next poll.
                    self.seen.insert(
                        key,
                        UnitCache {
                            revision: unit.revision.clone(),
                            updated_at: unit.updated_at,
                            applied: applied_now,
                        },
                    );
                    transitions.push(UnitTransition {
                        space_id: space_id.to_string(),
                        unit: unit.clone(),
                        kind: TransitionKind::PendingApply,
                    });
                }
                Some(cache) => {
                    let edited =
                        unit.revision != cache.revision || unit.updated_at > cache.updated_at;
                    if edited {
                        // Applied (or still pending) → PendingApply on re-edit.
                        cache.revision = unit.revision.clone();
                        cache.updated_at = unit.updated_at;
                        cache.applied = false;
                        transitions.push(UnitTransition {
                            space_id: space_id.to_string(),
                            unit: unit.clone(),
                            kind: TransitionKind::PendingApply,
                        });
                    } else if !cache.applied && applied_now {
                        cache.applied = true;
                        transitions.push(UnitTransition {
                            space_id: space_id.to_string(),
                            unit: unit.clone(),
                            kind: TransitionKind::Applied,
                        });
                    }
                }
            }
        }

        let listed: Vec<String> = units.iter().map(|u| u.id.clone()).collect();
        self.seen
            .retain(|(sid, uid), _| sid != space_id || listed.iter().any(|id| id == uid));

        if !transitions.is_empty() {
            debug!(
                "Space {}: {} unit transition(s) observed",
                space_id,
                transitions.len()
            );
        }
        transitions
    }
}
