//! User-facing boundary of the launcher.
//!
//! The orchestrator never renders anything itself. It talks to a
//! [`UserInterface`], which covers status lines, typed prompts, clipboard
//! copies and notifications:
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for CI/headless launches
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use basecamp::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.set_status("Checking environment");
//! ui.success("Environment ready");
//! ```

pub mod clipboard;
pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod prompts;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use clipboard::copy_to_system_clipboard;
pub use mock::{MockSpinner, MockUI};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use prompts::prompt_user;
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, BasecampTheme};

use crate::error::Result;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Replace the one-line launch status ("Installing dependencies...").
    fn set_status(&mut self, text: &str);

    /// Non-blocking notification (advisories, "run again later").
    fn notify(&mut self, msg: &str);

    /// Copy text to the clipboard. Returns false when no clipboard is available.
    fn copy_to_clipboard(&mut self, text: &str) -> bool;

    /// Show a prompt and wait for the user. Human decisions have no timeout.
    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult>;

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show a failed command together with its output.
    fn show_error_block(&mut self, command: &str, output: &str, hint: Option<&str>);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark as skipped.
    fn finish_skipped(&mut self, msg: &str);
}

/// A prompt to show to the user.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Unique key for the prompt (used for scripted answers).
    pub key: String,
    /// The question to display.
    pub question: String,
    /// The type of prompt.
    pub prompt_type: PromptType,
    /// Default value if user just presses enter.
    pub default: Option<String>,
}

impl Prompt {
    /// Build a select prompt from `(value, label)` pairs.
    pub fn select(key: &str, question: &str, options: &[(&str, &str)]) -> Self {
        Self {
            key: key.to_string(),
            question: question.to_string(),
            prompt_type: PromptType::Select {
                options: options
                    .iter()
                    .map(|(value, label)| PromptOption {
                        label: label.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            },
            default: options.first().map(|(value, _)| value.to_string()),
        }
    }

    /// Build a yes/no prompt.
    pub fn confirm(key: &str, question: &str, default: bool) -> Self {
        Self {
            key: key.to_string(),
            question: question.to_string(),
            prompt_type: PromptType::Confirm,
            default: Some(default.to_string()),
        }
    }
}

/// The type of prompt.
#[derive(Debug, Clone)]
pub enum PromptType {
    /// Yes/no confirmation.
    Confirm,
    /// Select one from a list of options.
    Select { options: Vec<PromptOption> },
    /// Select multiple from a list of options.
    MultiSelect { options: Vec<PromptOption> },
}

/// An option in a select prompt.
#[derive(Debug, Clone)]
pub struct PromptOption {
    /// Display label.
    pub label: String,
    /// Value returned when selected.
    pub value: String,
}

/// Result of a prompt.
#[derive(Debug, Clone)]
pub enum PromptResult {
    /// Boolean result from confirm.
    Bool(bool),
    /// Chosen value from select.
    String(String),
    /// Chosen values from multi-select.
    Strings(Vec<String>),
}

impl PromptResult {
    /// Get as string.
    pub fn as_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.clone(),
            Self::Strings(v) => v.join(","),
        }
    }

    /// Get as bool if this is a Bool result.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the selected values of a multi-select.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Self::Strings(v) => v.clone(),
            Self::String(s) if s.is_empty() => Vec::new(),
            Self::String(s) => s.split(',').map(|v| v.trim().to_string()).collect(),
            Self::Bool(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_result_as_string() {
        assert_eq!(PromptResult::Bool(true).as_string(), "true");
        assert_eq!(PromptResult::String("auto".to_string()).as_string(), "auto");
        assert_eq!(
            PromptResult::Strings(vec!["brew".to_string(), "nvm".to_string()]).as_string(),
            "brew,nvm"
        );
    }

    #[test]
    fn prompt_result_as_bool() {
        assert_eq!(PromptResult::Bool(false).as_bool(), Some(false));
        assert_eq!(PromptResult::String("test".to_string()).as_bool(), None);
    }

    #[test]
    fn prompt_result_as_strings_splits_scripted_answers() {
        assert_eq!(
            PromptResult::String("brew, nvm".to_string()).as_strings(),
            vec!["brew", "nvm"]
        );
        assert!(PromptResult::String(String::new()).as_strings().is_empty());
    }

    #[test]
    fn select_builder_defaults_to_first_option() {
        let prompt = Prompt::select(
            "dep_brew",
            "Homebrew is missing",
            &[("auto", "Install automatically"), ("abort", "Quit")],
        );
        assert_eq!(prompt.default.as_deref(), Some("auto"));
        match prompt.prompt_type {
            PromptType::Select { options } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[1].value, "abort");
                assert_eq!(options[1].label, "Quit");
            }
            _ => panic!("Expected Select variant"),
        }
    }

    #[test]
    fn confirm_builder_stores_default() {
        let prompt = Prompt::confirm("proceed", "Continue?", false);
        assert!(matches!(prompt.prompt_type, PromptType::Confirm));
        assert_eq!(prompt.default.as_deref(), Some("false"));
    }
}
