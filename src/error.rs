//! Error types for basecamp operations.
//!
//! This module defines [`BasecampError`], the primary error type used
//! throughout the launcher, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Network probe failures are never errors; they live inside
//!   [`ProbeResult`](crate::network::ProbeResult) as advisory data
//! - Wizard errors are recoverable and keep the user inside the wizard loop
//! - Migration and runtime errors are fatal for the current launch
//! - Use `anyhow::Error` (via `BasecampError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for basecamp operations.
#[derive(Debug, Error)]
pub enum BasecampError {
    /// A dependency check could not be evaluated.
    #[error("Dependency check failed for '{key}': {message}")]
    DependencyCheckFailed { key: String, message: String },

    /// An automatic install step exited unsuccessfully.
    #[error("Automatic install of '{key}' failed at `{step}`: {message}")]
    AutoInstallFailed {
        key: String,
        step: String,
        message: String,
    },

    /// The user reported a manual install as done but the check still fails.
    #[error("'{key}' is still missing after manual install")]
    ManualStillMissing { key: String },

    /// The user aborted the dependency wizard.
    #[error("Environment not ready: setup of '{key}' was aborted")]
    WizardAborted { key: String },

    /// Extracting, moving or committing the bundle failed.
    #[error("Bundle migration failed while {stage}: {message}")]
    MigrationError { stage: String, message: String },

    /// No usable runtime executable could be located.
    #[error("Cannot locate runtime '{runtime}' {version}: {message}")]
    RuntimeResolutionFailed {
        runtime: String,
        version: String,
        message: String,
    },

    /// The service process exited, or never printed its readiness marker.
    #[error("Local service did not become ready (exit code {exit_code:?}): {message}")]
    RuntimeNotReady {
        exit_code: Option<i32>,
        message: String,
    },

    /// Failed to parse a configuration or manifest file.
    #[error("Failed to parse {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Shell command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How the orchestrator reacts to an error.
///
/// Advisory failures (network probes) never become a `BasecampError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Keeps the user inside the loop that produced it.
    Recoverable,
    /// Aborts startup for this launch.
    Fatal,
}

impl BasecampError {
    /// Build a migration error for the given stage.
    pub fn migration(stage: impl Into<String>, message: impl ToString) -> Self {
        BasecampError::MigrationError {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error for the propagation policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            BasecampError::DependencyCheckFailed { .. }
            | BasecampError::AutoInstallFailed { .. }
            | BasecampError::ManualStillMissing { .. } => ErrorClass::Recoverable,
            _ => ErrorClass::Fatal,
        }
    }
}

/// Result type alias for basecamp operations.
pub type Result<T> = std::result::Result<T, BasecampError>;
