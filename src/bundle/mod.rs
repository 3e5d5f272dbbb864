//! Shipped bundle handling.
//!
//! The bundle dir holds `bundle.json`, `bundle.tar.gz` and optionally
//! `package.json`. [`BundleMigrator`] compares the bundle's build number
//! with the installed manifest and, when needed, replaces the install
//! directory while carrying user data across.

pub mod archive;
pub mod fsops;
pub mod manifest;
pub mod migrator;

pub use archive::{extract, pack, PackSummary};
pub use manifest::{Manifest, MigrationPlan};
pub use migrator::{
    BundleMigrator, MigrationOutcome, MigrationStage, PackageInstaller, ShellPackageInstaller,
};
