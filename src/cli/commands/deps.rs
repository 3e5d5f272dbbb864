//! Deps command implementation.
//!
//! `basecamp deps wizard` walks through missing dependencies one at a
//! time; `basecamp deps install <keys>` installs a selection without
//! prompting. `basecamp deps pip <file>` installs Python requirements.

use crate::cli::args::{DepsAction, DepsArgs};
use crate::dependencies::{DependencyKey, InstallSummary, WizardOutcome};
use crate::error::{BasecampError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext, EXIT_NOT_READY};

/// The deps command implementation.
pub struct DepsCommand {
    ctx: LaunchContext,
    args: DepsArgs,
}

impl DepsCommand {
    pub fn new(ctx: LaunchContext, args: DepsArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for DepsCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let orchestrator = self.ctx.orchestrator();

        match &self.args.action {
            DepsAction::Wizard => match orchestrator.run_wizard(ui)? {
                WizardOutcome::Satisfied(report) => {
                    ui.success(&report.summary());
                    Ok(CommandResult::success())
                }
                WizardOutcome::Aborted { key } => {
                    ui.warning(&format!("Stopped at {}; run again when ready.", key));
                    Ok(CommandResult::failure(EXIT_NOT_READY))
                }
            },
            DepsAction::Install { keys } => {
                let selection = parse_keys(keys)?;
                let summary = orchestrator.install_dependencies(&selection, ui)?;
                report(&summary, ui);
                Ok(if summary.manual_required.is_empty() {
                    CommandResult::success()
                } else {
                    CommandResult::failure(EXIT_NOT_READY)
                })
            }
            DepsAction::Pip { requirements } => {
                if !requirements.is_file() {
                    ui.error(&format!("{} not found", requirements.display()));
                    return Ok(CommandResult::failure(1));
                }
                orchestrator.install_python_requirements(requirements, ui)?;
                Ok(CommandResult::success())
            }
        }
    }
}

/// Parse dependency keys, rejecting unknown names.
pub fn parse_keys(keys: &[String]) -> Result<Vec<DependencyKey>> {
    keys.iter()
        .map(|k| {
            k.parse::<DependencyKey>()
                .map_err(|message| BasecampError::ConfigValidationError { message })
        })
        .collect()
}

fn report(summary: &InstallSummary, ui: &mut dyn UserInterface) {
    let join = |keys: &[DependencyKey]| {
        keys.iter()
            .map(DependencyKey::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    if !summary.installed.is_empty() {
        ui.success(&format!("Installed: {}", join(&summary.installed)));
    }
    if !summary.already_present.is_empty() {
        ui.message(&format!("Already present: {}", join(&summary.already_present)));
    }
    if !summary.manual_required.is_empty() {
        ui.warning(&format!(
            "Needs manual install: {}",
            join(&summary.manual_required)
        ));
    }
}
