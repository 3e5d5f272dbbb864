//! Visual theme and styling.

use console::Style;

/// Terminal styles for launcher output.
#[derive(Debug, Clone)]
pub struct BasecampTheme {
    /// Success messages (green).
    pub success: Style,
    /// Warnings and advisories (orange).
    pub warning: Style,
    /// Errors (red bold).
    pub error: Style,
    /// Status lines (cyan).
    pub status: Style,
    /// Secondary text.
    pub dim: Style,
    /// Highlighted text (bold).
    pub highlight: Style,
    /// Header banner (cyan bold).
    pub header: Style,
    /// Commands shown in output (dim italic).
    pub command: Style,
    /// Box-drawing borders.
    pub border: Style,
    /// Contextual hints.
    pub hint: Style,
}

impl Default for BasecampTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl BasecampTheme {
    /// Create the default colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            status: Style::new().cyan(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().cyan(),
            command: Style::new().dim().italic(),
            border: Style::new().dim(),
            hint: Style::new().cyan().dim(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            status: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            command: Style::new(),
            border: Style::new(),
            hint: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("○ {}", msg)))
    }

    /// Format a status line ("→ Starting local service").
    pub fn format_status(&self, msg: &str) -> String {
        format!("{}", self.status.apply_to(format!("→ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("▲"),
            self.highlight.apply_to(title)
        )
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}
