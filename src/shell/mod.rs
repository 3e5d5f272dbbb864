//! Shell command execution and platform detection.

pub mod command;
pub mod platform;

pub use command::{execute, CommandOptions, CommandResult, CommandRunner, ShellRunner};
pub use platform::{detect_shell, is_ci, Platform, ShellInfo, ShellType};
