//! Network reachability probing.
//!
//! The fast round probes a baseline host and the reference hosts in
//! parallel and returns a [`NetworkVerdict`] within roughly one timeout.
//! An optional extended round runs on a background thread afterwards and
//! delivers an [`ExtendedReport`] over a channel. Nothing here ever fails
//! a launch.

pub mod probe;
pub mod verdict;

pub use probe::{resolve_host, HttpProber, ProbeFailure, ProbeResult};
pub use verdict::{ExtendedReport, NetworkVerdict};

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::{Endpoint, NetworkSettings};

/// Runs fast and extended probe rounds.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    settings: NetworkSettings,
    prober: HttpProber,
}

impl NetworkProbe {
    /// Create a probe from settings. Fails only if the HTTP client cannot be built.
    pub fn new(settings: NetworkSettings) -> reqwest::Result<Self> {
        let prober = HttpProber::new(
            Duration::from_millis(settings.timeout_ms),
            settings.max_body_bytes,
        )?;
        Ok(Self { settings, prober })
    }

    /// Fast round: baseline and references in parallel, joined before returning.
    pub fn probe(&self) -> NetworkVerdict {
        let (baseline, references) = thread::scope(|s| {
            let baseline = s.spawn(move || self.prober.get(&self.settings.baseline.url));
            let references: Vec<_> = self
                .settings
                .references
                .iter()
                .map(|ep| (ep.name.clone(), s.spawn(move || self.prober.get(&ep.url))))
                .collect();

            let baseline = join_probe(baseline);
            let references: Vec<(String, ProbeResult)> = references
                .into_iter()
                .map(|(name, handle)| (name, join_probe(handle)))
                .collect();
            (baseline, references)
        });

        let verdict = NetworkVerdict::decide(baseline, references);
        tracing::info!(
            "network probe: {} (restricted: {})",
            verdict.reason,
            verdict.likely_restricted
        );
        verdict
    }

    /// Extended round, run in the background. The report arrives on the
    /// returned channel once every extended probe has finished.
    pub fn spawn_extended(&self, baseline_ok: bool) -> mpsc::Receiver<ExtendedReport> {
        let (tx, rx) = mpsc::channel();
        let probe = self.clone();

        thread::spawn(move || {
            let report = probe.run_extended(baseline_ok);
            if report.reinforced {
                tracing::warn!(
                    "extended probe: {} endpoints unreachable",
                    report.failures
                );
            } else {
                tracing::debug!("extended probe: {} failures", report.failures);
            }
            let _ = tx.send(report);
        });

        rx
    }

    /// Extended round on the calling thread.
    pub fn run_extended(&self, baseline_ok: bool) -> ExtendedReport {
        let timeout = self.prober.timeout();

        let probes = thread::scope(|s| {
            let http: Vec<_> = self
                .settings
                .extended
                .iter()
                .map(|Endpoint { name, url }| {
                    (name.clone(), s.spawn(move || self.prober.get(url)))
                })
                .collect();
            let dns: Vec<_> = self
                .settings
                .dns_hosts
                .iter()
                .map(|host| {
                    (
                        format!("dns_{}", host),
                        s.spawn(move || resolve_host(host, timeout)),
                    )
                })
                .collect();

            http.into_iter()
                .chain(dns)
                .map(|(name, handle)| (name, join_probe(handle)))
                .collect::<Vec<_>>()
        });

        ExtendedReport::decide(baseline_ok, probes)
    }
}

fn join_probe(handle: thread::ScopedJoinHandle<'_, ProbeResult>) -> ProbeResult {
    handle.join().unwrap_or_else(|_| ProbeResult {
        ok: false,
        status_code: None,
        failure: Some(ProbeFailure::Error("probe panicked".to_string())),
        elapsed_ms: 0,
    })
}
