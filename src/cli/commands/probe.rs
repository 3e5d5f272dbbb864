//! Probe command implementation.
//!
//! The `basecamp probe` command runs the fast reachability round and,
//! with `--extended`, the background round as well. The result is
//! advisory, so the command succeeds whatever it finds.

use serde_json::json;

use crate::cli::args::ProbeArgs;
use crate::error::{BasecampError, Result};
use crate::network::{ExtendedReport, NetworkProbe, NetworkVerdict};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext};
use super::display::show_probe;

/// The probe command implementation.
pub struct ProbeCommand {
    ctx: LaunchContext,
    args: ProbeArgs,
}

impl ProbeCommand {
    pub fn new(ctx: LaunchContext, args: ProbeArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for ProbeCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let probe = NetworkProbe::new(self.ctx.settings.network.clone())
            .map_err(|e| BasecampError::Other(e.into()))?;

        let verdict = probe.probe();
        let extended = self
            .args
            .extended
            .then(|| probe.run_extended(verdict.baseline_ok));

        if self.args.json {
            let value = json!({ "verdict": verdict, "extended": extended });
            let text =
                serde_json::to_string_pretty(&value).map_err(|e| BasecampError::Other(e.into()))?;
            ui.message(&text);
        } else {
            render(&verdict, extended.as_ref(), ui);
        }

        Ok(CommandResult::success())
    }
}

/// Human-readable verdict.
pub fn render(verdict: &NetworkVerdict, extended: Option<&ExtendedReport>, ui: &mut dyn UserInterface) {
    ui.show_header("Network");
    for (name, result) in &verdict.probes {
        show_probe(ui, name, result);
    }

    if verdict.likely_restricted {
        ui.warning(&format!(
            "Network looks restricted: {}. Check your proxy or VPN.",
            verdict.reason
        ));
    } else if !verdict.baseline_ok {
        ui.warning("No connectivity: the baseline host is unreachable.");
    } else {
        ui.success("All endpoints reachable");
    }

    if let Some(report) = extended {
        ui.message("");
        for (name, result) in &report.probes {
            show_probe(ui, name, result);
        }
        if report.reinforced {
            ui.warning(&format!(
                "{} extended checks failed; downloads are likely blocked",
                report.failures
            ));
        }
    }
}
