//! Host dependency checks and the install wizard.
//!
//! - [`DependencyChecker`] runs the ordered checks and builds a [`DependencyReport`]
//! - [`Installer`] runs automatic fix steps
//! - [`DependencyWizard`] walks the user through missing items one at a time

pub mod checker;
pub mod install;
pub mod item;
pub mod wizard;

pub use checker::DependencyChecker;
pub use install::{install_dependencies, pip_install, show_manual_steps, InstallSummary, Installer};
pub use item::{DependencyItem, DependencyKey, DependencyReport, PythonInfo};
pub use wizard::{DependencyWizard, WizardOutcome, WizardState};
