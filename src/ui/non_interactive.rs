//! Non-interactive UI for CI/headless launches.

use std::collections::HashMap;

use crate::error::{BasecampError, Result};

use super::theme::BasecampTheme;
use super::{
    copy_to_system_clipboard, OutputMode, Prompt, PromptResult, PromptType, SpinnerHandle,
    UserInterface,
};

/// Environment prefix for scripted prompt answers (`BASECAMP_PROMPT_DEP_BREW=auto`).
pub const PROMPT_ENV_PREFIX: &str = "BASECAMP_PROMPT_";

/// UI implementation for non-interactive mode.
///
/// Prompts resolve from `BASECAMP_PROMPT_<KEY>` variables, then from the
/// prompt default. Clipboard copies still go to the system clipboard so
/// manual instructions are at hand when someone looks at the machine.
pub struct NonInteractiveUI {
    mode: OutputMode,
    env_overrides: HashMap<String, String>,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        let env_overrides: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(PROMPT_ENV_PREFIX))
            .collect();

        Self {
            mode,
            env_overrides,
        }
    }

    /// Create with explicit overrides (for testing).
    pub fn with_overrides(mode: OutputMode, overrides: HashMap<String, String>) -> Self {
        Self {
            mode,
            env_overrides: overrides,
        }
    }

    fn env_key(key: &str) -> String {
        format!("{}{}", PROMPT_ENV_PREFIX, key.to_uppercase().replace('-', "_"))
    }
}

fn answer(prompt_type: &PromptType, value: &str) -> PromptResult {
    match prompt_type {
        PromptType::Confirm => PromptResult::Bool(super::prompts::parse_bool(value)),
        PromptType::MultiSelect { .. } => PromptResult::Strings(
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        PromptType::Select { .. } => PromptResult::String(value.to_string()),
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("⚠ {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn set_status(&mut self, text: &str) {
        if self.mode.shows_progress() {
            println!("→ {}", text);
        }
    }

    fn notify(&mut self, msg: &str) {
        if self.mode != OutputMode::Silent {
            eprintln!("⚠ {}", msg);
        }
    }

    fn copy_to_clipboard(&mut self, text: &str) -> bool {
        copy_to_system_clipboard(text)
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        if let Some(value) = self.env_overrides.get(&Self::env_key(&prompt.key)) {
            tracing::debug!("prompt '{}' answered from environment", prompt.key);
            return Ok(answer(&prompt.prompt_type, value));
        }

        if let Some(default) = &prompt.default {
            return Ok(answer(&prompt.prompt_type, default));
        }

        Err(BasecampError::ConfigValidationError {
            message: format!(
                "Cannot prompt for '{}' in non-interactive mode (no default value)",
                prompt.key
            ),
        })
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            println!("  {}", message);
        }
        Box::new(NoopSpinner)
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn show_error_block(&mut self, command: &str, output: &str, hint: Option<&str>) {
        eprintln!();
        eprintln!("    ┌─ Command ──────────────────────────");
        eprintln!("    │ {}", command);
        if !output.is_empty() {
            eprintln!("    ├─ Output ───────────────────────────");
            for line in self.mode.output_tail(output) {
                eprintln!("    │ {}", line);
            }
        }
        eprintln!("    └────────────────────────────────────");
        if let Some(h) = hint {
            eprintln!();
            eprintln!("    Hint: {}", h);
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Spinner that only prints the outcome.
struct NoopSpinner;

impl SpinnerHandle for NoopSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        println!("{}", BasecampTheme::plain().format_success(msg));
    }

    fn finish_error(&mut self, msg: &str) {
        println!("{}", BasecampTheme::plain().format_error(msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        println!("{}", BasecampTheme::plain().format_skipped(msg));
    }
}
