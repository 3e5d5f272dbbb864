//! Running fix steps.

use std::path::Path;

use crate::error::{BasecampError, Result};
use crate::shell::{CommandResult, CommandRunner, Platform};
use crate::ui::UserInterface;

use super::checker::DependencyChecker;
use super::item::{DependencyItem, DependencyKey, PythonInfo};

/// Runs automatic install steps one at a time.
pub struct Installer<R> {
    runner: R,
}

impl<R: CommandRunner> Installer<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run the item's automatic steps in order, stopping at the first failure.
    ///
    /// Comment lines (`# ...`) are instructions for humans and are skipped.
    pub fn install(&self, item: &DependencyItem, ui: &mut dyn UserInterface) -> Result<()> {
        let steps = item.auto_fix.as_deref().unwrap_or_default();
        let mut spinner = ui.start_spinner(&format!("Installing {}", item.label));

        for step in runnable(steps) {
            spinner.set_message(&format!("Installing {}: {}", item.label, summarize(step)));
            tracing::info!("install {}: {}", item.key, step);

            let result = self.runner.run(step);
            if !result.success {
                spinner.finish_error(&format!("Installing {} failed", item.label));
                return Err(BasecampError::AutoInstallFailed {
                    key: item.key.to_string(),
                    step: step.to_string(),
                    message: failure_message(&result),
                });
            }
        }

        spinner.finish_success(&format!("Installed {}", item.label));
        Ok(())
    }
}

/// What a batch install did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub installed: Vec<DependencyKey>,
    pub already_present: Vec<DependencyKey>,
    /// Items with no automatic path; their instructions were shown.
    pub manual_required: Vec<DependencyKey>,
}

/// Install the selected dependencies that are missing, in check order.
///
/// Stops at the first failing step. Items that can only be installed by
/// hand have their instructions shown and copied instead.
pub fn install_dependencies<C, I>(
    checker: &DependencyChecker<C>,
    installer: &Installer<I>,
    selection: &[DependencyKey],
    ui: &mut dyn UserInterface,
) -> Result<InstallSummary>
where
    C: CommandRunner,
    I: CommandRunner,
{
    let mut summary = InstallSummary::default();

    for key in checker.keys() {
        if !selection.contains(&key) {
            continue;
        }

        let item = checker.check_one(key)?;
        if item.installed {
            summary.already_present.push(key);
            continue;
        }

        if !item.has_auto_fix() {
            show_manual_steps(&item, ui);
            summary.manual_required.push(key);
            continue;
        }

        installer.install(&item, ui)?;
        if key == DependencyKey::Node && checker.platform() == Platform::MacOS {
            warn_shadowing_node(checker, ui);
        }
        summary.installed.push(key);
    }

    Ok(summary)
}

/// Print manual instructions and copy them to the clipboard.
pub fn show_manual_steps(item: &DependencyItem, ui: &mut dyn UserInterface) {
    let steps = item.manual_steps();
    ui.message(&format!("Install {} manually in a terminal:", item.label));
    for step in &steps {
        ui.message(&format!("  {}", step));
    }
    if !item.note.is_empty() {
        ui.message(&item.note);
    }

    if ui.copy_to_clipboard(&steps.join("\n")) {
        ui.notify("Commands copied to the clipboard");
    }
}

/// A Homebrew node on PATH shadows the version nvm selects.
fn warn_shadowing_node<C: CommandRunner>(checker: &DependencyChecker<C>, ui: &mut dyn UserInterface) {
    let result = checker
        .runner()
        .run("brew list --versions node 2>/dev/null || true");
    if result.success && !result.output().is_empty() {
        ui.warning(&format!(
            "Homebrew node ({}) may shadow the nvm version; consider `brew unlink node`",
            result.first_line()
        ));
    }
}

/// Install a requirements file into the detected Python environment.
///
/// Prefers conda's base environment when conda is available.
pub fn pip_install<R: CommandRunner>(
    runner: &R,
    python: &PythonInfo,
    requirements: &Path,
) -> Result<CommandResult> {
    let path = shell_quote(&requirements.display().to_string());
    let command = if runner.run("command -v conda").success {
        format!("conda run -n base pip install -r {}", path)
    } else {
        let pip = if python.pip_path.is_empty() {
            "pip3".to_string()
        } else {
            shell_quote(&python.pip_path)
        };
        format!("{} install -r {}", pip, path)
    };

    tracing::info!("pip install: {}", command);
    let result = runner.run(&command);
    if result.success {
        Ok(result)
    } else {
        Err(BasecampError::CommandFailed {
            command,
            code: result.exit_code,
        })
    }
}

fn runnable(steps: &[String]) -> impl Iterator<Item = &str> {
    steps
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
}

/// Last clause of a long step, for the spinner line.
fn summarize(step: &str) -> &str {
    step.rsplit("; ").next().unwrap_or(step)
}

fn failure_message(result: &CommandResult) -> String {
    if result.timed_out {
        return "timed out".to_string();
    }
    let line = result.last_line();
    if line.is_empty() {
        match result.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    } else {
        line
    }
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
