//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{BUNDLE_DIR_ENV, DATA_DIR_ENV};

/// Basecamp - bring a machine from fresh install to a running local service.
#[derive(Debug, Parser)]
#[command(name = "basecamp")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Writable data root (install dir, manifests, config.json)
    #[arg(long, global = true, env = DATA_DIR_ENV, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Shipped bundle directory (bundle.json, bundle.tar.gz)
    #[arg(long, global = true, env = BUNDLE_DIR_ENV, value_name = "DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Never prompt; use defaults and BASECAMP_PROMPT_<KEY> overrides
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe, fix dependencies, migrate the bundle and start the service (default)
    Launch(LaunchArgs),

    /// Report host dependencies without changing anything
    Check(CheckArgs),

    /// Install host dependencies
    Deps(DepsArgs),

    /// Check network reachability of required endpoints
    Probe(ProbeArgs),

    /// Show installed and bundled builds and service state
    Status(StatusArgs),

    /// Read or change config.json env entries
    Config(ConfigArgs),

    /// Pack a service directory into a bundle
    Pack(PackArgs),
}

/// Arguments for the `launch` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LaunchArgs {
    /// Skip the network probe
    #[arg(long)]
    pub skip_probe: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `deps` command.
#[derive(Debug, Clone, clap::Args)]
pub struct DepsArgs {
    #[command(subcommand)]
    pub action: DepsAction,
}

/// `deps` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum DepsAction {
    /// Walk through missing dependencies one at a time
    Wizard,

    /// Install the named dependencies without prompting
    Install {
        /// Dependency keys (xcode_clt, brew, conda, coreutils, timeout, nvm, node)
        #[arg(value_delimiter = ',', required = true)]
        keys: Vec<String>,
    },

    /// Install a Python requirements file (conda base when available)
    Pip {
        /// Path to a requirements.txt
        requirements: PathBuf,
    },
}

/// Arguments for the `probe` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProbeArgs {
    /// Also run the extended round and wait for it
    #[arg(long)]
    pub extended: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// `config` subcommands. Without one, every env entry is listed.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print one value
    Get { key: String },

    /// Set values (KEY=VALUE ...)
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Remove a value
    Unset { key: String },
}

/// Arguments for the `pack` command.
#[derive(Debug, Clone, clap::Args)]
pub struct PackArgs {
    /// Service directory to pack
    pub source: PathBuf,

    /// Output bundle directory (defaults to --bundle-dir)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Package manifest to ship next to the archive
    #[arg(long, value_name = "FILE")]
    pub package: Option<PathBuf>,
}
