//! Single-endpoint reachability probes.

use reqwest::blocking::Client;
use serde::Serialize;
use std::error::Error as _;
use std::io::Read;
use std::net::ToSocketAddrs;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Why a probe did not succeed. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    Timeout,
    /// Underlying error code (`ConnectionRefused`, `dns`, ...) or message.
    Error(String),
}

impl ProbeFailure {
    /// Short reason string (`timeout`, or the error code).
    pub fn reason(&self) -> &str {
        match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::Error(code) => code,
        }
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub failure: Option<ProbeFailure>,
    pub elapsed_ms: u64,
}

impl ProbeResult {
    fn status(code: u16, elapsed: Duration) -> Self {
        Self {
            ok: (200..400).contains(&code),
            status_code: Some(code),
            failure: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    fn failed(failure: ProbeFailure, elapsed: Duration) -> Self {
        Self {
            ok: false,
            status_code: None,
            failure: Some(failure),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    fn resolved(elapsed: Duration) -> Self {
        Self {
            ok: true,
            status_code: None,
            failure: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Human-readable summary (`200`, `timeout`, `ConnectionRefused`).
    pub fn describe(&self) -> String {
        match (&self.failure, self.status_code) {
            (Some(f), _) => f.reason().to_string(),
            (None, Some(code)) => code.to_string(),
            (None, None) => "resolved".to_string(),
        }
    }
}

/// Issues capped, bounded GET requests.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
    max_body_bytes: u64,
}

impl HttpProber {
    /// Create a prober. Redirects are never followed.
    pub fn new(timeout: Duration, max_body_bytes: u64) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("basecamp-netcheck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_body_bytes,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url`; `ok` when the status is 2xx or 3xx.
    pub fn get(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        match self.client.get(url).send() {
            Ok(mut response) => {
                let code = response.status().as_u16();
                // Only the status matters; the body read is capped and best-effort.
                let mut sink = Vec::new();
                let _ = response
                    .by_ref()
                    .take(self.max_body_bytes)
                    .read_to_end(&mut sink);
                ProbeResult::status(code, start.elapsed())
            }
            Err(e) => {
                let failure = classify(&e);
                tracing::debug!("probe {} failed: {}", url, failure.reason());
                ProbeResult::failed(failure, start.elapsed())
            }
        }
    }
}

fn classify(err: &reqwest::Error) -> ProbeFailure {
    if err.is_timeout() {
        return ProbeFailure::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return ProbeFailure::Timeout;
            }
            return ProbeFailure::Error(format!("{:?}", io.kind()));
        }
        source = cause.source();
    }

    if err.is_connect() {
        ProbeFailure::Error("connect".to_string())
    } else {
        ProbeFailure::Error(err.to_string())
    }
}

/// Resolve `host`, giving up after `timeout`.
pub fn resolve_host(host: &str, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    let (tx, rx) = mpsc::channel();
    let target = format!("{}:443", host);

    // The lookup itself cannot be cancelled; an abandoned thread finishes on its own.
    thread::spawn(move || {
        let result = target.to_socket_addrs().map(|mut addrs| addrs.next().is_some());
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(true)) => ProbeResult::resolved(start.elapsed()),
        Ok(Ok(false)) => ProbeResult::failed(
            ProbeFailure::Error("no addresses".to_string()),
            start.elapsed(),
        ),
        Ok(Err(e)) => ProbeResult::failed(
            ProbeFailure::Error(format!("{:?}", e.kind())),
            start.elapsed(),
        ),
        Err(_) => ProbeResult::failed(ProbeFailure::Timeout, start.elapsed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn prober(ms: u64) -> HttpProber {
        HttpProber::new(Duration::from_millis(ms), 32 * 1024).unwrap()
    }

    #[test]
    fn success_status_is_ok() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/robots.txt");
            then.status(200).body("User-agent: *");
        });

        let result = prober(1500).get(&server.url("/robots.txt"));
        assert!(result.ok);
        assert_eq!(result.status_code, Some(200));
        assert!(result.failure.is_none());
    }

    #[test]
    fn redirect_counts_as_ok_and_is_not_followed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(302).header("location", "http://127.0.0.1:1/");
        });

        let result = prober(1500).get(&server.url("/"));
        assert!(result.ok);
        assert_eq!(result.status_code, Some(302));
    }

    #[test]
    fn server_error_is_not_ok() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        });

        let result = prober(1500).get(&server.url("/"));
        assert!(!result.ok);
        assert_eq!(result.status_code, Some(503));
        assert!(result.failure.is_none());
    }

    #[test]
    fn slow_endpoint_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(1500));
        });

        let result = prober(200).get(&server.url("/slow"));
        assert!(!result.ok);
        assert_eq!(result.failure, Some(ProbeFailure::Timeout));
        assert!(result.elapsed_ms < 1500);
    }

    #[test]
    fn refused_connection_is_an_error_reason() {
        let result = prober(1500).get("http://127.0.0.1:1/");
        assert!(!result.ok);
        assert!(matches!(result.failure, Some(ProbeFailure::Error(_))));
    }

    #[test]
    fn large_body_is_capped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("x".repeat(256 * 1024));
        });

        let result = HttpProber::new(Duration::from_millis(1500), 1024)
            .unwrap()
            .get(&server.url("/big"));
        assert!(result.ok);
    }

    #[test]
    fn localhost_resolves() {
        let result = resolve_host("localhost", Duration::from_millis(1500));
        assert!(result.ok);
        assert_eq!(result.describe(), "resolved");
    }

    #[test]
    fn invalid_host_does_not_resolve() {
        let result = resolve_host("basecamp.invalid", Duration::from_millis(1500));
        assert!(!result.ok);
        assert!(result.failure.is_some());
    }

    #[test]
    fn describe_prefers_failure_reason() {
        let r = ProbeResult::failed(ProbeFailure::Timeout, Duration::ZERO);
        assert_eq!(r.describe(), "timeout");
        let r = ProbeResult::status(204, Duration::ZERO);
        assert_eq!(r.describe(), "204");
    }
}
