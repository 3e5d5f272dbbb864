//! Interactive dependency wizard.
//!
//! The wizard resolves one missing dependency at a time, always the first
//! missing one in check order. For each it offers the automatic path (when
//! there is one), the manual path, or abort. After any fix attempt only
//! the handled item is re-verified before the full check runs again.
//!
//! ```text
//! Checking ─▶ AwaitingChoice ─▶ AutoInstalling ─▶ Verifying ─▶ Checking
//!    │              │        └─▶ ManualWait ────────▲
//!    ▼              ▼
//! Satisfied      Aborted
//! ```

use std::collections::HashSet;

use crate::error::{BasecampError, Result};
use crate::shell::CommandRunner;
use crate::ui::{Prompt, UserInterface};

use super::checker::DependencyChecker;
use super::install::{show_manual_steps, Installer};
use super::item::{DependencyItem, DependencyKey, DependencyReport};

/// Observable wizard states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Checking,
    AwaitingChoice,
    AutoInstalling,
    ManualWait,
    Verifying,
    Satisfied,
    Aborted,
}

/// How the wizard ended.
#[derive(Debug)]
pub enum WizardOutcome {
    Satisfied(DependencyReport),
    Aborted { key: DependencyKey },
}

impl WizardOutcome {
    /// Treat an abort as an error.
    pub fn into_result(self) -> Result<DependencyReport> {
        match self {
            WizardOutcome::Satisfied(report) => Ok(report),
            WizardOutcome::Aborted { key } => Err(BasecampError::WizardAborted {
                key: key.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remedy {
    Auto,
    Manual,
    Abort,
}

enum Step {
    Checking,
    AwaitingChoice(DependencyItem),
    AutoInstalling(DependencyItem),
    ManualWait(DependencyItem),
    Verifying(DependencyItem),
    Done(WizardOutcome),
}

impl Step {
    fn state(&self) -> WizardState {
        match self {
            Step::Checking => WizardState::Checking,
            Step::AwaitingChoice(_) => WizardState::AwaitingChoice,
            Step::AutoInstalling(_) => WizardState::AutoInstalling,
            Step::ManualWait(_) => WizardState::ManualWait,
            Step::Verifying(_) => WizardState::Verifying,
            Step::Done(WizardOutcome::Satisfied(_)) => WizardState::Satisfied,
            Step::Done(WizardOutcome::Aborted { .. }) => WizardState::Aborted,
        }
    }
}

/// Drives missing dependencies to installed, one item at a time.
pub struct DependencyWizard<'a, C, I> {
    checker: &'a DependencyChecker<C>,
    installer: &'a Installer<I>,
    history: Vec<WizardState>,
    attempted: HashSet<DependencyKey>,
}

impl<'a, C: CommandRunner, I: CommandRunner> DependencyWizard<'a, C, I> {
    pub fn new(checker: &'a DependencyChecker<C>, installer: &'a Installer<I>) -> Self {
        Self {
            checker,
            installer,
            history: Vec::new(),
            attempted: HashSet::new(),
        }
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[WizardState] {
        &self.history
    }

    /// Run until every dependency is satisfied or the user aborts.
    ///
    /// There is no timeout; a human may take as long as they need. A
    /// non-interactive UI aborts on the second pass over the same item.
    pub fn run(&mut self, ui: &mut dyn UserInterface) -> Result<WizardOutcome> {
        let mut step = Step::Checking;
        loop {
            let state = step.state();
            tracing::debug!("dependency wizard: {:?}", state);
            self.history.push(state);

            step = match step {
                Step::Checking => self.check(ui),
                Step::AwaitingChoice(item) => self.choose(item, ui)?,
                Step::AutoInstalling(item) => match self.installer.install(&item, ui) {
                    Ok(()) => Step::Verifying(item),
                    Err(e) => {
                        tracing::warn!("{}", e);
                        let output = match &e {
                            BasecampError::AutoInstallFailed { message, .. } => message.clone(),
                            other => other.to_string(),
                        };
                        let failed_step = match &e {
                            BasecampError::AutoInstallFailed { step, .. } => step.clone(),
                            _ => item.label.clone(),
                        };
                        ui.show_error_block(
                            &failed_step,
                            &output,
                            Some("Choose the manual path to run the commands yourself"),
                        );
                        Step::Checking
                    }
                },
                Step::ManualWait(item) => self.wait_for_manual(item, ui)?,
                Step::Verifying(item) => {
                    let fresh = self.checker.check_one(item.key)?;
                    if fresh.installed {
                        ui.success(&format!("{} ready {}", fresh.label, fresh.version_info));
                    } else {
                        let err = BasecampError::ManualStillMissing {
                            key: fresh.key.to_string(),
                        };
                        ui.warning(&err.to_string());
                    }
                    Step::Checking
                }
                Step::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn check(&mut self, ui: &mut dyn UserInterface) -> Step {
        ui.set_status("Checking environment...");
        let report = self.checker.check_all();

        let Some(item) = report.first_missing().cloned() else {
            ui.success(&report.summary());
            return Step::Done(WizardOutcome::Satisfied(report));
        };

        if !ui.is_interactive() && self.attempted.contains(&item.key) {
            ui.error(&format!("{} is still missing", item.label));
            return Step::Done(WizardOutcome::Aborted { key: item.key });
        }

        ui.message(&describe_missing(&item));
        Step::AwaitingChoice(item)
    }

    fn choose(&mut self, item: DependencyItem, ui: &mut dyn UserInterface) -> Result<Step> {
        self.attempted.insert(item.key);

        let mut options = Vec::new();
        if item.has_auto_fix() {
            options.push(("auto", "Install automatically"));
        }
        options.push(("manual", "Show me the commands"));
        options.push(("abort", "Abort setup"));

        let prompt = Prompt::select(
            &format!("dep_{}", item.key),
            &format!("{} is missing. How do you want to install it?", item.label),
            &options,
        );
        let answer = ui.prompt(&prompt)?.as_string();

        let remedy = match answer.as_str() {
            "auto" if item.has_auto_fix() => Remedy::Auto,
            "manual" => Remedy::Manual,
            "abort" => Remedy::Abort,
            other => {
                ui.warning(&format!("Unknown choice '{}'", other));
                Remedy::Abort
            }
        };

        Ok(match remedy {
            Remedy::Auto => Step::AutoInstalling(item),
            Remedy::Manual => {
                show_manual_steps(&item, ui);
                Step::ManualWait(item)
            }
            Remedy::Abort => Step::Done(WizardOutcome::Aborted { key: item.key }),
        })
    }

    fn wait_for_manual(&mut self, item: DependencyItem, ui: &mut dyn UserInterface) -> Result<Step> {
        let prompt = Prompt::select(
            &format!("dep_{}_done", item.key),
            &format!("Run the commands in a terminal, then continue to re-check {}", item.label),
            &[("continue", "Done, check again"), ("abort", "Abort setup")],
        );
        Ok(match ui.prompt(&prompt)?.as_string().as_str() {
            "abort" => Step::Done(WizardOutcome::Aborted { key: item.key }),
            _ => Step::Verifying(item),
        })
    }
}

/// One line about the item being resolved, with whatever the check detected.
fn describe_missing(item: &DependencyItem) -> String {
    if item.version_info.is_empty() {
        format!("{}: not found", item.label)
    } else {
        format!("{}: {}", item.label, item.version_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::checker::tests::{checker, FakeHost};
    use crate::ui::MockUI;
    use WizardState::*;

    const ALL: [&str; 8] = [
        "xcode", "brew", "conda", "coreutils", "timeout", "nvm", "node", "python",
    ];

    fn host_without(missing: &[&str]) -> FakeHost {
        let tools: Vec<&'static str> = ALL.into_iter().filter(|t| !missing.contains(t)).collect();
        FakeHost::with(&tools)
    }

    fn installer(host: &FakeHost) -> Installer<impl CommandRunner + '_> {
        Installer::new(move |cmd: &str| host.run(cmd))
    }

    #[test]
    fn satisfied_host_finishes_immediately() {
        let host = host_without(&[]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();

        let mut wizard = DependencyWizard::new(&checker, &installer);
        let outcome = wizard.run(&mut ui).unwrap();

        assert!(matches!(outcome, WizardOutcome::Satisfied(ref r) if r.all_satisfied));
        assert_eq!(wizard.history(), [Checking, Satisfied]);
        assert!(ui.prompts_shown().is_empty());
    }

    #[test]
    fn automatic_install_then_verify() {
        let host = host_without(&["coreutils"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_coreutils", "auto");

        let mut wizard = DependencyWizard::new(&checker, &installer);
        let outcome = wizard.run(&mut ui).unwrap();

        assert!(matches!(outcome, WizardOutcome::Satisfied(_)));
        assert_eq!(
            wizard.history(),
            [Checking, AwaitingChoice, AutoInstalling, Verifying, Checking, Satisfied]
        );
        assert!(host.has("coreutils"));
        assert!(ui.has_success("GNU coreutils ready"));
    }

    #[test]
    fn items_are_resolved_in_order() {
        let host = host_without(&["nvm", "node", "conda"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_default_prompt_response("auto");

        let mut wizard = DependencyWizard::new(&checker, &installer);
        wizard.run(&mut ui).unwrap().into_result().unwrap();

        assert_eq!(ui.prompts_shown(), ["dep_conda", "dep_nvm", "dep_node"]);
    }

    #[test]
    fn only_the_current_missing_item_is_shown() {
        let host = host_without(&["conda", "nvm", "node"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_conda", "abort");

        let outcome = DependencyWizard::new(&checker, &installer)
            .run(&mut ui)
            .unwrap();

        assert!(matches!(outcome, WizardOutcome::Aborted { .. }));
        assert!(!ui.messages().is_empty());
        for message in ui.messages() {
            assert!(message.contains("Miniconda"), "unexpected: {message}");
            assert!(!message.contains("nvm"), "second item shown: {message}");
            assert!(!message.contains("Node.js"), "second item shown: {message}");
        }
    }

    #[test]
    fn only_the_handled_item_is_reverified() {
        let host = host_without(&["timeout"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_timeout", "auto");

        DependencyWizard::new(&checker, &installer)
            .run(&mut ui)
            .unwrap();

        // Two full passes; the verification in between never re-checks Xcode.
        let xcode_checks = host
            .commands
            .borrow()
            .iter()
            .filter(|c| c.as_str() == "xcode-select -p")
            .count();
        assert_eq!(xcode_checks, 2);
    }

    #[test]
    fn failed_install_returns_to_checking() {
        let host = host_without(&["coreutils"]);
        host.fail_command("brew install coreutils");
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.queue_prompt_responses("dep_coreutils", vec!["auto", "abort"]);

        let mut wizard = DependencyWizard::new(&checker, &installer);
        let outcome = wizard.run(&mut ui).unwrap();

        assert!(matches!(
            outcome,
            WizardOutcome::Aborted {
                key: DependencyKey::Coreutils
            }
        ));
        assert_eq!(
            wizard.history(),
            [Checking, AwaitingChoice, AutoInstalling, Checking, AwaitingChoice, Aborted]
        );
        assert_eq!(ui.error_blocks().len(), 1);
        assert_eq!(ui.error_blocks()[0].0, "brew install coreutils");
    }

    #[test]
    fn manual_path_copies_instructions_and_waits() {
        let host = host_without(&["brew"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.queue_prompt_responses("dep_brew", vec!["manual", "abort"]);
        ui.set_prompt_response("dep_brew_done", "continue");

        let mut wizard = DependencyWizard::new(&checker, &installer);
        let outcome = wizard.run(&mut ui).unwrap();

        assert_eq!(
            wizard.history(),
            [Checking, AwaitingChoice, ManualWait, Verifying, Checking, AwaitingChoice, Aborted]
        );
        assert!(ui.clipboard()[0].contains("Homebrew/install"));
        assert!(ui.has_warning("still missing"));
        assert!(matches!(
            outcome.into_result(),
            Err(BasecampError::WizardAborted { .. })
        ));
    }

    #[test]
    fn manual_only_item_has_no_auto_option() {
        let host = host_without(&["xcode"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_xcode_clt", "auto");

        let outcome = DependencyWizard::new(&checker, &installer)
            .run(&mut ui)
            .unwrap();

        assert!(matches!(outcome, WizardOutcome::Aborted { .. }));
        assert!(ui.has_warning("Unknown choice 'auto'"));
    }

    #[test]
    fn abort_from_manual_wait() {
        let host = host_without(&["xcode"]);
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_xcode_clt", "manual");
        ui.set_prompt_response("dep_xcode_clt_done", "abort");

        let mut wizard = DependencyWizard::new(&checker, &installer);
        let outcome = wizard.run(&mut ui).unwrap();

        assert!(matches!(
            outcome,
            WizardOutcome::Aborted {
                key: DependencyKey::XcodeClt
            }
        ));
        assert_eq!(wizard.history().last(), Some(&Aborted));
        assert_eq!(ui.clipboard(), ["xcode-select --install"]);
    }

    #[test]
    fn non_interactive_gives_up_after_one_attempt() {
        let host = host_without(&["coreutils"]);
        host.fail_command("brew install coreutils");
        let (checker, installer) = (checker(&host), installer(&host));
        let mut ui = MockUI::new();
        ui.set_interactive(false);

        let outcome = DependencyWizard::new(&checker, &installer)
            .run(&mut ui)
            .unwrap();

        assert!(matches!(outcome, WizardOutcome::Aborted { .. }));
        assert_eq!(ui.prompts_shown(), ["dep_coreutils"]);
    }
}
