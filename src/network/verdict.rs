//! Connectivity verdicts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::probe::ProbeResult;

/// Fast-round verdict. Advisory only.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkVerdict {
    pub baseline_ok: bool,
    /// Reachability per reference endpoint name.
    pub per_endpoint_ok: BTreeMap<String, bool>,
    /// Baseline reachable but at least one reference is not.
    pub likely_restricted: bool,
    /// `all ok`, `baseline not ok`, or `<a>+<b> failed`.
    pub reason: String,
    pub probes: BTreeMap<String, ProbeResult>,
    pub checked_at: DateTime<Utc>,
}

impl NetworkVerdict {
    /// Decide from the baseline result and named reference results.
    pub fn decide(baseline: ProbeResult, references: Vec<(String, ProbeResult)>) -> Self {
        let baseline_ok = baseline.ok;
        let per_endpoint_ok: BTreeMap<String, bool> = references
            .iter()
            .map(|(name, r)| (name.clone(), r.ok))
            .collect();

        let failed: Vec<&str> = references
            .iter()
            .filter(|(_, r)| !r.ok)
            .map(|(name, _)| name.as_str())
            .collect();

        let likely_restricted = baseline_ok && !failed.is_empty();
        let reason = if !baseline_ok {
            "baseline not ok".to_string()
        } else if failed.is_empty() {
            "all ok".to_string()
        } else {
            format!("{} failed", failed.join("+"))
        };

        let mut probes: BTreeMap<String, ProbeResult> = references.into_iter().collect();
        probes.insert("baseline".to_string(), baseline);

        Self {
            baseline_ok,
            per_endpoint_ok,
            likely_restricted,
            reason,
            probes,
            checked_at: Utc::now(),
        }
    }
}

/// Result of the background round.
#[derive(Debug, Clone, Serialize)]
pub struct ExtendedReport {
    pub probes: BTreeMap<String, ProbeResult>,
    pub failures: usize,
    /// Baseline was reachable and two or more extended probes failed.
    pub reinforced: bool,
}

impl ExtendedReport {
    pub fn decide(baseline_ok: bool, probes: Vec<(String, ProbeResult)>) -> Self {
        let failures = probes.iter().filter(|(_, r)| !r.ok).count();
        Self {
            reinforced: baseline_ok && failures >= 2,
            failures,
            probes: probes.into_iter().collect(),
        }
    }
}
