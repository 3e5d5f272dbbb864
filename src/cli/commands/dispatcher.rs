//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`LaunchContext`] for the resolved paths and settings every command shares
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::PathBuf;

use crate::cli::args::{Cli, Commands, LaunchArgs};
use crate::config::{load_settings, LauncherPaths, LauncherSettings};
use crate::error::Result;
use crate::orchestrator::HostOrchestrator;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Exit code when the environment is not ready (wizard aborted or
/// dependencies missing).
pub const EXIT_NOT_READY: i32 = 2;

/// Resolved paths and launcher settings.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub paths: LauncherPaths,
    pub settings: LauncherSettings,
}

impl LaunchContext {
    pub fn new(paths: LauncherPaths, settings: LauncherSettings) -> Self {
        Self { paths, settings }
    }

    /// Resolve paths and read `launcher.yml` from the data root.
    pub fn load(data_dir: Option<PathBuf>, bundle_dir: Option<PathBuf>) -> Result<Self> {
        let paths = LauncherPaths::resolve(data_dir.as_deref(), bundle_dir.as_deref())?;
        let settings = load_settings(&paths.settings_file())?;
        tracing::debug!(
            "data root {}, bundle dir {}",
            paths.data_root.display(),
            paths.bundle_dir.display()
        );
        Ok(Self::new(paths, settings))
    }

    /// Orchestrator wired to this machine.
    pub fn orchestrator(&self) -> HostOrchestrator {
        HostOrchestrator::for_host(self.paths.clone(), self.settings.clone())
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    context: LaunchContext,
}

impl CommandDispatcher {
    pub fn new(context: LaunchContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it. No subcommand means `launch`.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let ctx = self.context.clone();
        match &cli.command {
            Some(Commands::Launch(args)) => {
                super::launch::LaunchCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Check(args)) => {
                super::check::CheckCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Deps(args)) => {
                super::deps::DepsCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Probe(args)) => {
                super::probe::ProbeCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Status(args)) => {
                super::status::StatusCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Config(args)) => {
                super::config::ConfigCommand::new(ctx, args.clone()).execute(ui)
            }
            Some(Commands::Pack(args)) => {
                super::pack::PackCommand::new(ctx, args.clone()).execute(ui)
            }
            None => super::launch::LaunchCommand::new(ctx, LaunchArgs::default()).execute(ui),
        }
    }
}
