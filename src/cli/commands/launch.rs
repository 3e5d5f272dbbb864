//! Launch command implementation.
//!
//! The `basecamp launch` command runs the whole pipeline and then stays in
//! the foreground as the owner of the service process. Exiting basecamp
//! stops a service it started, including on SIGINT, SIGTERM and SIGHUP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::args::LaunchArgs;
use crate::error::Result;
use crate::orchestrator::{EventBus, LaunchEvent, LaunchPhase};
use crate::runtime::{ServiceHandle, ServiceStatus};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext, EXIT_NOT_READY};

/// Time the service gets to exit on its own when basecamp is asked to quit.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// The launch command implementation.
pub struct LaunchCommand {
    ctx: LaunchContext,
    args: LaunchArgs,
}

impl LaunchCommand {
    pub fn new(ctx: LaunchContext, args: LaunchArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for LaunchCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut ctx = self.ctx.clone();
        if self.args.skip_probe {
            ctx.settings.network.enabled = false;
        }

        ui.show_header(&ctx.settings.app_name);

        let (bus, events) = EventBus::channel();
        let report = ctx.orchestrator().with_events(bus).launch(ui)?;
        drain(&events, ui);

        if report.state.phase() == LaunchPhase::NotReady {
            return Ok(CommandResult::failure(EXIT_NOT_READY));
        }

        match report.service {
            Some(ServiceStatus::AlreadyRunning { port }) => {
                ui.message(&format!(
                    "A service is already answering on http://localhost:{}",
                    port
                ));
                Ok(CommandResult::success())
            }
            Some(ServiceStatus::Started(handle)) => {
                let quit = quit_flag();
                supervise(handle, &events, &quit, ui)
            }
            None => Ok(CommandResult::failure(1)),
        }
    }
}

/// Flag raised when basecamp receives a quit signal.
fn quit_flag() -> Arc<AtomicBool> {
    let quit = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&quit);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("could not install quit handler: {}", e);
    }
    quit
}

/// Wait on the service until it exits or basecamp is asked to quit,
/// relaying late launch events.
fn supervise(
    mut handle: ServiceHandle,
    events: &Receiver<LaunchEvent>,
    quit: &AtomicBool,
    ui: &mut dyn UserInterface,
) -> Result<CommandResult> {
    ui.message(&format!(
        "Service running at http://localhost:{} (pid {}). Press Ctrl+C to stop.",
        handle.port(),
        handle.pid()
    ));

    let mut listening = true;
    loop {
        if quit.load(Ordering::SeqCst) {
            ui.message("Stopping service...");
            let code = handle.shutdown(STOP_GRACE)?;
            tracing::info!("service {} stopped ({:?})", handle.pid(), code);
            return Ok(CommandResult::success());
        }

        if let Some(code) = handle.try_wait()? {
            ui.warning(&format!(
                "Service exited{}",
                code.map(|c| format!(" with code {}", c)).unwrap_or_default()
            ));
            return Ok(match code {
                Some(0) => CommandResult::success(),
                Some(c) => CommandResult::failure(c),
                None => CommandResult::failure(1),
            });
        }

        if listening {
            match events.recv_timeout(Duration::from_millis(500)) {
                Ok(event) => relay(event, ui),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => listening = false,
            }
        } else {
            std::thread::sleep(Duration::from_millis(500));
        }
    }
}

fn drain(events: &Receiver<LaunchEvent>, ui: &mut dyn UserInterface) {
    for event in events.try_iter() {
        relay(event, ui);
    }
}

fn relay(event: LaunchEvent, ui: &mut dyn UserInterface) {
    match event {
        LaunchEvent::ExtendedProbe(report) if report.reinforced => {
            ui.warning(&format!(
                "{} of {} network checks failed; package downloads may be blocked",
                report.failures,
                report.probes.len()
            ));
        }
        LaunchEvent::ExtendedProbe(report) => {
            tracing::debug!("extended probe: {} failures", report.failures);
        }
        LaunchEvent::PhaseChanged { from, to } => tracing::debug!("phase {} -> {}", from, to),
        LaunchEvent::Status(text) => tracing::debug!("status: {}", text),
        LaunchEvent::NetworkRestricted(verdict) => {
            tracing::debug!("network restricted: {}", verdict.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ExtendedReport, ProbeResult};
    use crate::ui::MockUI;

    fn probes(failed: usize) -> Vec<(String, ProbeResult)> {
        (0..5)
            .map(|i| {
                let result = ProbeResult {
                    ok: i >= failed,
                    status_code: None,
                    failure: None,
                    elapsed_ms: 0,
                };
                (format!("probe{}", i), result)
            })
            .collect()
    }

    #[test]
    fn reinforced_extended_probe_warns() {
        let mut ui = MockUI::new();
        relay(
            LaunchEvent::ExtendedProbe(ExtendedReport::decide(true, probes(2))),
            &mut ui,
        );
        assert!(ui.has_warning("2 of 5 network checks failed"));
    }

    #[test]
    fn single_extended_failure_is_quiet() {
        let mut ui = MockUI::new();
        relay(
            LaunchEvent::ExtendedProbe(ExtendedReport::decide(true, probes(1))),
            &mut ui,
        );
        assert!(ui.warnings().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn quit_request_stops_the_service() {
        let child = std::process::Command::new("sh")
            .args(["-c", "sleep 30"])
            .spawn()
            .unwrap();
        let handle = ServiceHandle::new(child, 3015);
        let pid = handle.pid();
        let (_bus, events) = EventBus::channel();
        let quit = AtomicBool::new(true);
        let mut ui = MockUI::new();

        let result = supervise(handle, &events, &quit, &mut ui).unwrap();

        assert!(result.success);
        assert!(ui.messages().iter().any(|m| m == "Stopping service..."));
        // SAFETY: signal 0 only checks for existence.
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
        assert!(!alive);
    }

    #[test]
    fn phase_events_are_not_shown() {
        let mut ui = MockUI::new();
        relay(
            LaunchEvent::PhaseChanged {
                from: LaunchPhase::Idle,
                to: LaunchPhase::Probing,
            },
            &mut ui,
        );
        assert!(ui.messages().is_empty());
    }
}
