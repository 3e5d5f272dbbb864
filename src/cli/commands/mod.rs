//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`basecamp launch`, `basecamp status`)
//! - Shared path and settings resolution in [`LaunchContext`]
//! - Consistent global flag handling

pub mod check;
pub mod config;
pub mod deps;
pub mod dispatcher;
pub mod display;
pub mod launch;
pub mod pack;
pub mod probe;
pub mod status;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, LaunchContext, EXIT_NOT_READY};
