//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion. It can be configured with
//! pre-determined prompt responses.
//!
//! # Example
//!
//! ```
//! use basecamp::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.set_prompt_response("dep_brew", "manual");
//!
//! ui.set_status("Checking environment");
//! ui.copy_to_clipboard("brew install coreutils");
//!
//! assert_eq!(ui.statuses(), ["Checking environment"]);
//! assert_eq!(ui.clipboard(), ["brew install coreutils"]);
//! ```

use std::collections::{HashMap, VecDeque};

use crate::error::Result;

use super::prompts::parse_bool;
use super::{OutputMode, Prompt, PromptResult, PromptType, SpinnerHandle, UserInterface};

/// Mock UI implementation for testing.
///
/// Supports both single responses (via `set_prompt_response`) and queued
/// responses (via `queue_prompt_responses`) for keys asked several times.
#[derive(Debug)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    clipboard_available: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    statuses: Vec<String>,
    notifications: Vec<String>,
    clipboard: Vec<String>,
    headers: Vec<String>,
    spinners: Vec<String>,
    error_blocks: Vec<(String, String, Option<String>)>,
    prompt_responses: HashMap<String, String>,
    prompt_queues: HashMap<String, VecDeque<String>>,
    prompts_shown: Vec<String>,
    default_prompt_response: Option<String>,
}

impl Default for MockUI {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUI {
    /// Create an interactive MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::with_mode(OutputMode::Normal)
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            interactive: true,
            clipboard_available: true,
            messages: Vec::new(),
            successes: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            statuses: Vec::new(),
            notifications: Vec::new(),
            clipboard: Vec::new(),
            headers: Vec::new(),
            spinners: Vec::new(),
            error_blocks: Vec::new(),
            prompt_responses: HashMap::new(),
            prompt_queues: HashMap::new(),
            prompts_shown: Vec::new(),
            default_prompt_response: None,
        }
    }

    /// Set a response for a prompt key.
    pub fn set_prompt_response(&mut self, key: &str, response: &str) {
        self.prompt_responses
            .insert(key.to_string(), response.to_string());
    }

    /// Queue multiple responses for the same prompt key.
    ///
    /// Responses are returned in order. After the queue is exhausted,
    /// falls back to `set_prompt_response` or defaults.
    pub fn queue_prompt_responses(&mut self, key: &str, responses: Vec<&str>) {
        let queue = responses.into_iter().map(|s| s.to_string()).collect();
        self.prompt_queues.insert(key.to_string(), queue);
    }

    /// Set a response for any prompt key not explicitly configured.
    pub fn set_default_prompt_response(&mut self, response: &str) {
        self.default_prompt_response = Some(response.to_string());
    }

    /// Set whether this mock behaves as interactive.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Simulate a machine without a clipboard tool.
    pub fn set_clipboard_available(&mut self, available: bool) {
        self.clipboard_available = available;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Status lines, in order.
    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    /// Texts copied to the clipboard, in order.
    pub fn clipboard(&self) -> &[String] {
        &self.clipboard
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get all spinner messages that were started.
    pub fn spinners(&self) -> &[String] {
        &self.spinners
    }

    /// Get all captured error blocks as (command, output, hint).
    pub fn error_blocks(&self) -> &[(String, String, Option<String>)] {
        &self.error_blocks
    }

    /// Get all prompts that were shown (by key).
    pub fn prompts_shown(&self) -> &[String] {
        &self.prompts_shown
    }

    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }

    pub fn has_notification(&self, msg: &str) -> bool {
        self.notifications.iter().any(|m| m.contains(msg))
    }

    fn scripted_response(&mut self, key: &str) -> Option<String> {
        if let Some(response) = self.prompt_queues.get_mut(key).and_then(|q| q.pop_front()) {
            return Some(response);
        }
        self.prompt_responses
            .get(key)
            .cloned()
            .or_else(|| self.default_prompt_response.clone())
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn set_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn notify(&mut self, msg: &str) {
        self.notifications.push(msg.to_string());
    }

    fn copy_to_clipboard(&mut self, text: &str) -> bool {
        if self.clipboard_available {
            self.clipboard.push(text.to_string());
        }
        self.clipboard_available
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        self.prompts_shown.push(prompt.key.clone());

        let response = self
            .scripted_response(&prompt.key)
            .or_else(|| prompt.default.clone());

        Ok(match (&prompt.prompt_type, response) {
            (PromptType::Confirm, Some(r)) => PromptResult::Bool(parse_bool(&r)),
            (PromptType::Confirm, None) => PromptResult::Bool(false),
            (PromptType::MultiSelect { .. }, Some(r)) => PromptResult::Strings(
                r.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            (PromptType::MultiSelect { .. }, None) => PromptResult::Strings(Vec::new()),
            (PromptType::Select { .. }, r) => PromptResult::String(r.unwrap_or_default()),
        })
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners.push(message.to_string());
        Box::new(MockSpinner::new())
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_error_block(&mut self, command: &str, output: &str, hint: Option<&str>) {
        self.error_blocks.push((
            command.to_string(),
            output.to_string(),
            hint.map(|h| h.to_string()),
        ));
        self.errors.push(command.to_string());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Mock spinner that captures finish messages.
#[derive(Debug, Default)]
pub struct MockSpinner {
    messages: Vec<String>,
    finish_message: Option<String>,
}

impl MockSpinner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all messages set during spinning.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get the final finish message.
    pub fn finish_message(&self) -> Option<&str> {
        self.finish_message.as_deref()
    }
}

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.finish_message = Some(msg.to_string());
    }

    fn finish_error(&mut self, msg: &str) {
        self.finish_message = Some(msg.to_string());
    }

    fn finish_skipped(&mut self, msg: &str) {
        self.finish_message = Some(msg.to_string());
    }
}
