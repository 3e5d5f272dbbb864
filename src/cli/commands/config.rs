//! Config command implementation.
//!
//! The `basecamp config` command reads and edits the `env` map in
//! `config.json`. Changes reach the service's `.env` on the next launch.

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{parse_assignment, AppConfig};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, LaunchContext};

/// The config command implementation.
pub struct ConfigCommand {
    ctx: LaunchContext,
    args: ConfigArgs,
}

impl ConfigCommand {
    pub fn new(ctx: LaunchContext, args: ConfigArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let path = self.ctx.paths.config_file();
        let mut config = AppConfig::load(&path)?;

        match &self.args.action {
            None => {
                if config.env.is_empty() {
                    ui.message(&format!("# no env entries in {}", path.display()));
                }
                for (key, value) in &config.env {
                    ui.message(&format!("{}={}", key, value));
                }
            }
            Some(ConfigAction::Get { key }) => match config.get(key) {
                Some(value) => ui.message(value),
                None => {
                    ui.error(&format!("{} is not set", key));
                    return Ok(CommandResult::failure(1));
                }
            },
            Some(ConfigAction::Set { assignments }) => {
                // Validate everything before writing anything.
                let pairs = assignments
                    .iter()
                    .map(|a| parse_assignment(a))
                    .collect::<Result<Vec<_>>>()?;
                for (key, value) in &pairs {
                    config.set(key, value);
                }
                config.save(&path)?;
                ui.success(&format!(
                    "Updated {}; restart the service to apply",
                    pairs
                        .iter()
                        .map(|(k, _)| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            Some(ConfigAction::Unset { key }) => {
                if config.unset(key).is_none() {
                    ui.warning(&format!("{} was not set", key));
                    return Ok(CommandResult::success());
                }
                config.save(&path)?;
                ui.success(&format!("Removed {}", key));
            }
        }

        Ok(CommandResult::success())
    }
}
