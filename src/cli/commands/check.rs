//! Check command implementation.
//!
//! The `basecamp check` command reports every host dependency in check
//! order without installing anything.

use crate::cli::args::CheckArgs;
use crate::dependencies::DependencyReport;
use crate::error::{BasecampError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext, EXIT_NOT_READY};
use super::display::show_dependency;

/// The check command implementation.
pub struct CheckCommand {
    ctx: LaunchContext,
    args: CheckArgs,
}

impl CheckCommand {
    pub fn new(ctx: LaunchContext, args: CheckArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let report = self.ctx.orchestrator().check_dependencies();

        if self.args.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| BasecampError::Other(e.into()))?;
            ui.message(&json);
        } else {
            render(&report, ui);
        }

        Ok(if report.all_satisfied {
            CommandResult::success()
        } else {
            CommandResult::failure(EXIT_NOT_READY)
        })
    }
}

/// Human-readable report.
pub fn render(report: &DependencyReport, ui: &mut dyn UserInterface) {
    ui.show_header("Dependencies");
    for item in &report.items {
        show_dependency(ui, item);
    }

    let python = &report.python;
    if python.ok {
        ui.message(&format!("  Python {} ({})", python.version, python.python_path));
    } else {
        ui.message("  Python: not found");
    }

    ui.message("");
    if report.all_satisfied {
        ui.success(&report.summary());
    } else {
        ui.warning(&report.summary());
        ui.message("Run `basecamp deps wizard` to fix them one at a time.");
    }
}
