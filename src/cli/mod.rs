//! Command-line interface for basecamp.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    CheckArgs, Cli, Commands, ConfigAction, ConfigArgs, DepsAction, DepsArgs, LaunchArgs,
    PackArgs, ProbeArgs, StatusArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult, LaunchContext, EXIT_NOT_READY};
