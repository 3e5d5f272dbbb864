//! basecamp - bring a machine from "just installed" to "local service running".
//!
//! The launcher probes the network, walks the user through missing host
//! dependencies, migrates the shipped bundle into a writable install
//! directory without losing user data, and starts the local service,
//! waiting until it reports readiness.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Launcher settings, paths, `config.json` and `.env` merging
//! - [`error`] - Error types and result aliases
//! - [`network`] - Reachability probes and verdicts
//! - [`dependencies`] - Host dependency checks and the install wizard
//! - [`bundle`] - Bundle manifests, archives and migration
//! - [`runtime`] - Runtime resolution and service supervision
//! - [`orchestrator`] - The launch pipeline
//! - [`shell`] - Shell command execution
//! - [`ui`] - Interactive prompts, spinners, and terminal output
//!
//! # Example
//!
//! ```
//! use basecamp::bundle::{Manifest, MigrationPlan};
//!
//! let installed = Manifest::new(2);
//! let bundle = Manifest::new(5);
//! let plan = MigrationPlan::decide(Some(&installed), &bundle);
//! assert_eq!(plan, MigrationPlan::Upgrade { from: 2, to: 5 });
//! assert!(plan.requires_install());
//! ```

pub mod bundle;
pub mod cli;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod runtime;
pub mod shell;
pub mod ui;

pub use error::{BasecampError, Result};
