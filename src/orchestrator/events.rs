//! Launch phases and the event channel.

use serde::Serialize;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::network::{ExtendedReport, NetworkVerdict};

/// Where a launch is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchPhase {
    Idle,
    Probing,
    Dependencies,
    Migrating,
    StartingService,
    /// Service answered; terminal.
    Ready,
    /// The user stopped the dependency wizard; terminal.
    NotReady,
    /// A fatal error ended the launch; terminal.
    Failed,
}

impl LaunchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LaunchPhase::Ready | LaunchPhase::NotReady | LaunchPhase::Failed
        )
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchPhase::Idle => "idle",
            LaunchPhase::Probing => "probing network",
            LaunchPhase::Dependencies => "checking dependencies",
            LaunchPhase::Migrating => "migrating bundle",
            LaunchPhase::StartingService => "starting service",
            LaunchPhase::Ready => "ready",
            LaunchPhase::NotReady => "not ready",
            LaunchPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Something a launch reports to whoever renders it.
#[derive(Debug, Clone)]
pub enum LaunchEvent {
    /// Sent exactly once per phase transition.
    PhaseChanged { from: LaunchPhase, to: LaunchPhase },
    /// Free-form progress text.
    Status(String),
    /// Fast probe verdict said the network looks restricted.
    NetworkRestricted(NetworkVerdict),
    /// Background probe round finished. May arrive after the launch ends.
    ExtendedProbe(ExtendedReport),
}

/// Sending half of the launch event channel.
///
/// A bus with no receiver, or whose receiver was dropped, discards events.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    sender: Option<Sender<LaunchEvent>>,
}

impl EventBus {
    pub fn channel() -> (Self, Receiver<LaunchEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// A bus that drops everything.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: LaunchEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(LaunchEvent::Status(text.into()));
    }
}

/// Explicit state for one launch, passed through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchState {
    phase: LaunchPhase,
    history: Vec<LaunchPhase>,
}

impl Default for LaunchState {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchState {
    pub fn new() -> Self {
        Self {
            phase: LaunchPhase::Idle,
            history: vec![LaunchPhase::Idle],
        }
    }

    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    /// Every phase entered, in order, starting with `Idle`.
    pub fn history(&self) -> &[LaunchPhase] {
        &self.history
    }

    /// Move to `to`, emitting one `PhaseChanged`.
    ///
    /// Re-entering the current phase and leaving a terminal phase are
    /// ignored and emit nothing. Returns whether the phase changed.
    pub fn advance(&mut self, to: LaunchPhase, events: &EventBus) -> bool {
        if to == self.phase || self.phase.is_terminal() {
            return false;
        }
        let from = self.phase;
        self.phase = to;
        self.history.push(to);
        tracing::info!("launch: {} -> {}", from, to);
        events.emit(LaunchEvent::PhaseChanged { from, to });
        true
    }
}
