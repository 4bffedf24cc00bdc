//! Cost estimation - rough monthly estimates from declared resources.
//!
//! Estimates are deliberately coarse: fixed per-core and per-GiB rates over
//! a declared replica count. They are not cloud billing; they only need to
//! be stable, so predicted-versus-actual variance stays meaningful.

use costwatch_model::{ResourceHints, ResourceUsage, Unit};
use serde_yaml::Value;

/// Monthly rate per declared vCPU core.
const CPU_RATE_PER_CORE: f64 = 15.0;
/// Monthly rate per declared GiB of memory.
const MEM_RATE_PER_GIB: f64 = 5.0;
/// Flat monthly overhead per replica (storage, networking, control plane).
const BASE_RATE_PER_REPLICA: f64 = 5.0;

/// Result of estimating a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitEstimate {
    pub monthly_cost: f64,
    /// Set when the manifest could not be parsed and the estimate degraded.
    pub note: Option<String>,
}

/// Pure estimator mapping declared resources to a monthly cost.
///
/// Stateless; identical input always yields identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEstimator;

impl CostEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the monthly cost of declared resource hints.
    pub fn estimate_monthly_cost(&self, hints: &ResourceHints) -> f64 {
        let per_replica =
            hints.cpu_cores * CPU_RATE_PER_CORE + hints.memory_gib * MEM_RATE_PER_GIB + BASE_RATE_PER_REPLICA;
        per_replica * f64::from(hints.replicas.max(1))
    }

    /// Apply the same rates to observed consumption. Replicas are already
    /// folded into the observation, so no multiplier.
    pub fn estimate_usage(&self, usage: &ResourceUsage) -> f64 {
        usage.cpu_cores * CPU_RATE_PER_CORE + usage.memory_gib * MEM_RATE_PER_GIB + BASE_RATE_PER_REPLICA
    }

    /// Estimate a unit from its raw manifest.
    ///
    /// Never fails: a manifest that does not parse degrades to a zero-cost
    /// estimate with an explanatory note, a manifest that parses but lacks
    /// hints gets the baseline.
    pub fn estimate_unit(&self, unit: &Unit) -> UnitEstimate {
        match parse_hints(&unit.manifest) {
            Ok(hints) => UnitEstimate {
                monthly_cost: self.estimate_monthly_cost(&hints),
                note: None,
            },
            Err(reason) => UnitEstimate {
                monthly_cost: 0.0,
                note: Some(format!("manifest for '{}' not parseable: {}", unit.name, reason)),
            },
        }
    }
}

/// Extract resource hints from a YAML manifest.
///
/// Recognized keys: top-level `replicas`, and `resources.cpu` /
/// `resources.memory` in Kubernetes quantity syntax (`2`, `500m`, `2Gi`).
/// Missing keys default; an unparseable document is an error the caller
/// downgrades.
pub fn parse_hints(manifest: &str) -> Result<ResourceHints, String> {
    let doc: Value = serde_yaml::from_str(manifest).map_err(|e| e.to_string())?;
    let map = match doc {
        Value::Mapping(m) => m,
        Value::Null => return Err("empty manifest".to_string()),
        _ => return Err("manifest root is not a mapping".to_string()),
    };

    let mut hints = ResourceHints::default();

    if let Some(replicas) = map.get("replicas") {
        hints.replicas = replicas
            .as_u64()
            .ok_or_else(|| "replicas is not an integer".to_string())? as u32;
    }

    if let Some(Value::Mapping(resources)) = map.get("resources") {
        if let Some(cpu) = resources.get("cpu") {
            hints.cpu_cores = parse_cpu(cpu)?;
        }
        if let Some(memory) = resources.get("memory") {
            hints.memory_gib = parse_memory_gib(memory)?;
        }
    }

    Ok(hints)
}

/// Parse a CPU quantity: bare number of cores, or millicores (`500m`).
fn parse_cpu(value: &Value) -> Result<f64, String> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| "cpu is neither number nor string".to_string())?
        .trim();
    if let Some(millis) = s.strip_suffix('m') {
        let m: f64 = millis.parse().map_err(|_| format!("invalid cpu quantity '{}'", s))?;
        Ok(m / 1000.0)
    } else {
        s.parse().map_err(|_| format!("invalid cpu quantity '{}'", s))
    }
}

/// Parse a memory quantity into GiB. Bare numbers are taken as GiB.
fn parse_memory_gib(value: &Value) -> Result<f64, String> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| "memory is neither number nor string".to_string())?
        .trim();

    let suffixes: [(&str, f64); 8] = [
        ("Ki", 1.0 / (1024.0 * 1024.0)),
        ("Mi", 1.0 / 1024.0),
        ("Gi", 1.0),
        ("Ti", 1024.0),
        ("K", 1e3 / (1024.0 * 1024.0 * 1024.0)),
        ("M", 1e6 / (1024.0 * 1024.0 * 1024.0)),
        ("G", 1e9 / (1024.0 * 1024.0 * 1024.0)),
        ("T", 1e12 / (1024.0 * 1024.0 * 1024.0)),
    ];
    for (suffix, factor) in suffixes {
        if let Some(num) = s.strip_suffix(suffix) {
            let n: f64 = num
                .parse()
                .map_err(|_| format!("invalid memory quantity '{}'", s))?;
            return Ok(n * factor);
        }
    }
    s.parse().map_err(|_| format!("invalid memory quantity '{}'", s))
}
