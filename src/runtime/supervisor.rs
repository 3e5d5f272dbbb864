//! Starting the local service and waiting for readiness.

use reqwest::blocking::Client;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{BasecampError, Result};

use super::handle::ServiceHandle;

/// How long to wait on each poll for output before checking the process.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Partial lines longer than this are logged and dropped.
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Everything needed to start the service.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub port: u16,
    pub install_dir: PathBuf,
    /// Entry script, relative to the install dir.
    pub entry: String,
    pub readiness_marker: String,
    pub ready_timeout: Duration,
    /// Extra environment on top of the inherited one.
    pub env: BTreeMap<String, String>,
}

/// Result of [`RuntimeSupervisor::ensure_running`].
#[derive(Debug)]
pub enum ServiceStatus {
    /// Something already answers on the port; nothing was spawned.
    AlreadyRunning { port: u16 },
    /// Spawned by us and reported ready.
    Started(ServiceHandle),
}

impl ServiceStatus {
    pub fn port(&self) -> u16 {
        match self {
            ServiceStatus::AlreadyRunning { port } => *port,
            ServiceStatus::Started(handle) => handle.port(),
        }
    }
}

/// Detects, spawns and watches the local service.
pub struct RuntimeSupervisor {
    spec: ServiceSpec,
    client: Client,
}

impl RuntimeSupervisor {
    pub fn new(spec: ServiceSpec) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self { spec, client })
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Whether anything answers HTTP on the port. Any status counts.
    pub fn is_running(&self) -> bool {
        port_answers(&self.client, self.spec.port)
    }

    /// Reuse a service already on the port, or start one with `runtime`.
    pub fn ensure_running(&self, runtime: &Path) -> Result<ServiceStatus> {
        if self.is_running() {
            tracing::info!("service already running on port {}", self.spec.port);
            return Ok(ServiceStatus::AlreadyRunning {
                port: self.spec.port,
            });
        }
        self.start(runtime).map(ServiceStatus::Started)
    }

    /// Spawn the service and block until it prints the readiness marker,
    /// exits, or the ready timeout passes.
    pub fn start(&self, runtime: &Path) -> Result<ServiceHandle> {
        let entry = self.spec.install_dir.join(&self.spec.entry);
        tracing::info!("starting {} {}", runtime.display(), entry.display());

        let mut child = Command::new(runtime)
            .arg(&entry)
            .current_dir(&self.spec.install_dir)
            .envs(&self.spec.env)
            .env("PATH", path_with(runtime))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BasecampError::RuntimeResolutionFailed {
                runtime: runtime.display().to_string(),
                version: String::new(),
                message: e.to_string(),
            })?;

        let ready = watch_output(&mut child, &self.spec.readiness_marker);
        let handle = ServiceHandle::new(child, self.spec.port);
        self.wait_ready(handle, ready)
    }

    fn wait_ready(&self, mut handle: ServiceHandle, ready: Receiver<()>) -> Result<ServiceHandle> {
        let deadline = Instant::now() + self.spec.ready_timeout;
        let mut output_closed = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                handle.shutdown(Duration::from_secs(2))?;
                return Err(BasecampError::RuntimeNotReady {
                    exit_code: None,
                    message: format!(
                        "no '{}' within {}s",
                        self.spec.readiness_marker,
                        self.spec.ready_timeout.as_secs()
                    ),
                });
            }

            let slice = remaining.min(POLL_INTERVAL);
            if output_closed {
                thread::sleep(slice);
            } else {
                match ready.recv_timeout(slice) {
                    Ok(()) => {
                        tracing::info!("service ready on port {}", self.spec.port);
                        return Ok(handle);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        // Stdout closed without the marker; it can no longer arrive.
                        tracing::debug!("service closed stdout before ready");
                        output_closed = true;
                    }
                }
            }

            if let Some(code) = handle.try_wait()? {
                return Err(exited(code));
            }
        }
    }
}

fn exited(code: Option<i32>) -> BasecampError {
    BasecampError::RuntimeNotReady {
        exit_code: code,
        message: "service exited before it was ready".to_string(),
    }
}

/// Whether something answers HTTP on `localhost:<port>`.
pub fn port_answers(client: &Client, port: u16) -> bool {
    match client.get(format!("http://localhost:{}", port)).send() {
        Ok(response) => {
            tracing::debug!("port {} answered {}", port, response.status());
            true
        }
        Err(_) => false,
    }
}

/// Forward stdout chunks to a scanner thread and log stderr.
///
/// The receiver gets one message when the marker is seen and is dropped
/// when stdout closes. Both readers keep draining after readiness so the
/// service never blocks on a full pipe.
fn watch_output(child: &mut Child, marker: &str) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();

    if let Some(mut stdout) = child.stdout.take() {
        let mut scanner = MarkerScanner::new(marker);
        thread::spawn(move || {
            let mut tx = Some(tx);
            let mut buf = [0u8; 4096];
            loop {
                let n = match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                for line in scanner.feed(&buf[..n]) {
                    tracing::debug!("service: {}", line);
                }
                if scanner.found() {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
            if let Some(line) = scanner.finish() {
                tracing::debug!("service: {}", line);
            }
        });
    }

    if let Some(mut stderr) = child.stderr.take() {
        thread::spawn(move || {
            let mut scanner = MarkerScanner::new("");
            let mut buf = [0u8; 4096];
            while let Ok(n) = stderr.read(&mut buf) {
                if n == 0 {
                    break;
                }
                for line in scanner.feed(&buf[..n]) {
                    tracing::warn!("service: {}", line);
                }
            }
            if let Some(line) = scanner.finish() {
                tracing::warn!("service: {}", line);
            }
        });
    }

    rx
}

/// Splits a byte stream into lines and watches for a marker that may
/// arrive split across reads or without a trailing newline.
#[derive(Debug)]
pub(crate) struct MarkerScanner {
    marker: Vec<u8>,
    /// Bytes of the current line not yet emitted.
    pending: Vec<u8>,
    /// Most recent bytes, enough to catch a marker split across chunks.
    window: Vec<u8>,
    found: bool,
}

impl MarkerScanner {
    pub(crate) fn new(marker: &str) -> Self {
        Self {
            marker: marker.as_bytes().to_vec(),
            pending: Vec::new(),
            window: Vec::new(),
            found: false,
        }
    }

    pub(crate) fn found(&self) -> bool {
        self.found
    }

    /// Add a chunk; returns the lines it completed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if !self.found && !self.marker.is_empty() {
            self.window.extend_from_slice(chunk);
            self.found = contains(&self.window, &self.marker);
            let cut = self.window.len().saturating_sub(self.marker.len() - 1);
            self.window.drain(..cut);
        }

        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
        }

        lines
    }

    /// The trailing partial line, if any.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        Some(line)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// `PATH` with the runtime's directory in front.
fn path_with(runtime: &Path) -> OsString {
    let mut dirs: Vec<PathBuf> = runtime.parent().map(Path::to_path_buf).into_iter().collect();
    if let Some(current) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&current));
    }
    std::env::join_paths(dirs).unwrap_or_else(|_| std::env::var_os("PATH").unwrap_or_default())
}
