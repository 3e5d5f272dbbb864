//! Status command implementation.
//!
//! The `basecamp status` command shows the installed and bundled builds,
//! what the next launch would do, the cached runtime and whether the
//! service port answers.

use serde_json::json;

use crate::bundle::Manifest;
use crate::cli::args::StatusArgs;
use crate::config::AppConfig;
use crate::error::{BasecampError, Result};
use crate::runtime::cached_path;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext};
use super::display::show_field;

/// The status command implementation.
pub struct StatusCommand {
    ctx: LaunchContext,
    args: StatusArgs,
}

impl StatusCommand {
    pub fn new(ctx: LaunchContext, args: StatusArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let paths = &self.ctx.paths;
        let orchestrator = self.ctx.orchestrator();

        let installed = Manifest::load_optional(&paths.installed_manifest())?;
        let bundle = Manifest::load_optional(&paths.bundle_manifest())?;
        let plan = match &bundle {
            Some(_) => Some(orchestrator.migration_plan()?),
            None => None,
        };
        let version = orchestrator.runtime_version();
        let runtime = cached_path(paths, &version);
        let port = AppConfig::load(&paths.config_file())?.port(self.ctx.settings.default_port);
        let running = orchestrator.service_running()?;

        if self.args.json {
            let value = json!({
                "data_root": paths.data_root,
                "bundle_dir": paths.bundle_dir,
                "installed_build": installed.as_ref().map(|m| m.build),
                "bundle_build": bundle.as_ref().map(|m| m.build),
                "plan": plan,
                "runtime_version": version,
                "runtime_path": runtime,
                "port": port,
                "running": running,
            });
            let text =
                serde_json::to_string_pretty(&value).map_err(|e| BasecampError::Other(e.into()))?;
            ui.message(&text);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("{} - Status", self.ctx.settings.app_name));
        show_field(ui, "data root", &paths.data_root.display().to_string());
        show_field(
            ui,
            "installed build",
            &installed
                .map(|m| m.build.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        show_field(
            ui,
            "bundle build",
            &bundle
                .map(|m| m.build.to_string())
                .unwrap_or_else(|| format!("missing ({})", paths.bundle_dir.display())),
        );
        if let Some(plan) = &plan {
            show_field(ui, "next launch", &plan.to_string());
        }
        show_field(
            ui,
            &self.ctx.settings.runtime.name,
            &match &runtime {
                Some(path) => format!("{} ({})", version, path.display()),
                None => format!("{} (not resolved yet)", version),
            },
        );
        show_field(
            ui,
            "service",
            &if running {
                format!("running on port {}", port)
            } else {
                format!("stopped (port {})", port)
            },
        );

        Ok(CommandResult::success())
    }
}
