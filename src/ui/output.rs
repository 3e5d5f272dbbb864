//! Output verbosity.

/// Failed-command output lines kept outside verbose mode.
const ERROR_TAIL_LINES: usize = 20;

/// How much the launcher prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    Verbose,
    #[default]
    Normal,
    /// Spinners and final status only.
    Quiet,
    /// Errors only. Used by embedding callers that render their own UI.
    Silent,
}

impl OutputMode {
    /// Mode selected by the global `--quiet`/`--verbose` flags. Quiet wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    /// One-line launch status updates ("Installing packages...").
    pub fn shows_progress(&self) -> bool {
        matches!(self, Self::Verbose | Self::Normal)
    }

    pub fn shows_spinners(&self) -> bool {
        !matches!(self, Self::Silent)
    }

    /// Status lines, headers and non-error messages.
    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Silent)
    }

    /// Lines of a failed command's output worth showing in this mode.
    ///
    /// Verbose shows everything; other modes keep the tail, where installers
    /// print the actual error.
    pub fn output_tail<'a>(&self, output: &'a str) -> Vec<&'a str> {
        let lines: Vec<&str> = output.lines().collect();
        if matches!(self, Self::Verbose) || lines.len() <= ERROR_TAIL_LINES {
            return lines;
        }
        lines[lines.len() - ERROR_TAIL_LINES..].to_vec()
    }
}
