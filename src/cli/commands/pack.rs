//! Pack command implementation.
//!
//! The `basecamp pack` command builds a bundle from a service directory
//! and bumps the bundle's build number.

use crate::bundle::pack;
use crate::cli::args::PackArgs;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext};

/// The pack command implementation.
pub struct PackCommand {
    ctx: LaunchContext,
    args: PackArgs,
}

impl PackCommand {
    pub fn new(ctx: LaunchContext, args: PackArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for PackCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let out = self
            .args
            .out
            .clone()
            .unwrap_or_else(|| self.ctx.paths.bundle_dir.clone());

        let mut spinner = ui.start_spinner(&format!("Packing {}", self.args.source.display()));
        let summary = match pack(&self.args.source, &out, self.args.package.as_deref()) {
            Ok(summary) => summary,
            Err(e) => {
                spinner.finish_error("Packing failed");
                return Err(e.into());
            }
        };
        spinner.finish_success(&format!(
            "Packed {} files into {} (build {})",
            summary.files,
            summary.archive.display(),
            summary.build
        ));

        Ok(CommandResult::success())
    }
}
