//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::error::Result;

use super::{
    copy_to_system_clipboard, prompt_user, should_use_colors, BasecampTheme, NonInteractiveUI,
    OutputMode, ProgressSpinner, Prompt, PromptResult, SpinnerHandle, UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: BasecampTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode) -> Self {
        let theme = if should_use_colors() {
            BasecampTheme::new()
        } else {
            BasecampTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn set_status(&mut self, text: &str) {
        if self.mode.shows_progress() {
            writeln!(self.term, "{}", self.theme.format_status(text)).ok();
        }
    }

    fn notify(&mut self, msg: &str) {
        // Notifications are advisories; they survive quiet mode.
        if self.mode != OutputMode::Silent {
            writeln!(self.term).ok();
            writeln!(self.term, "  {}", self.theme.format_warning(msg)).ok();
            writeln!(self.term).ok();
        }
    }

    fn copy_to_clipboard(&mut self, text: &str) -> bool {
        let copied = copy_to_system_clipboard(text);
        if copied && self.mode.shows_status() {
            writeln!(
                self.term,
                "  {}",
                self.theme.hint.apply_to("(copied to clipboard)")
            )
            .ok();
        }
        copied
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        prompt_user(prompt, &self.term)
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::new(message))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_error_block(&mut self, command: &str, output: &str, hint: Option<&str>) {
        let b = &self.theme.border;
        writeln!(
            self.term,
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to("Command ──────────────────────────")
        )
        .ok();
        writeln!(
            self.term,
            "    {} {}",
            b.apply_to("│"),
            self.theme.command.apply_to(command)
        )
        .ok();

        if !output.is_empty() {
            writeln!(
                self.term,
                "    {} {}",
                b.apply_to("├─"),
                b.apply_to("Output ───────────────────────────")
            )
            .ok();
            for line in self.mode.output_tail(output) {
                writeln!(self.term, "    {} {}", b.apply_to("│"), line).ok();
            }
        }

        writeln!(
            self.term,
            "    {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();

        if let Some(h) = hint {
            writeln!(self.term).ok();
            writeln!(
                self.term,
                "    {} {}",
                self.theme.hint.apply_to("Hint:"),
                self.theme.hint.apply_to(h)
            )
            .ok();
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }
}

/// Create the appropriate UI based on context.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    if interactive && Term::stdout().is_term() {
        Box::new(TerminalUI::new(mode))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_output_mode() {
        let ui = TerminalUI::new(OutputMode::Quiet);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn create_ui_non_interactive() {
        let ui = create_ui(false, OutputMode::Normal);
        assert!(!ui.is_interactive());
    }

    #[test]
    fn create_ui_respects_mode() {
        let ui = create_ui(false, OutputMode::Silent);
        assert_eq!(ui.output_mode(), OutputMode::Silent);
    }
}
