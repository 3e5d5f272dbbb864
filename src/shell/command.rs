//! Shell command execution.

use crate::error::{BasecampError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal or timed out).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,

    /// Whether the command was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
            timed_out: false,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
            timed_out: false,
        }
    }

    /// Trimmed stdout, falling back to stderr when stdout is empty.
    pub fn output(&self) -> String {
        let out = self.stdout.trim();
        if out.is_empty() {
            self.stderr.trim().to_string()
        } else {
            out.to_string()
        }
    }

    /// First line of [`output`](Self::output).
    pub fn first_line(&self) -> String {
        self.output().lines().next().unwrap_or("").to_string()
    }

    /// Last non-empty line of [`output`](Self::output).
    pub fn last_line(&self) -> String {
        self.output()
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Capture stdout (if false, inherits from parent).
    pub capture_stdout: bool,

    /// Capture stderr (if false, inherits from parent).
    pub capture_stderr: bool,

    /// Timeout in seconds (None = no timeout).
    pub timeout: Option<u64>,
}

impl CommandOptions {
    /// Capture both streams, with an optional timeout.
    pub fn captured(timeout: Option<u64>) -> Self {
        Self {
            capture_stdout: true,
            capture_stderr: true,
            timeout,
            ..Default::default()
        }
    }
}

/// Runs shell snippets for dependency checks and install steps.
///
/// Checks never fail hard: a command that cannot be spawned is reported
/// as an unsuccessful [`CommandResult`].
pub trait CommandRunner {
    /// Run a command and capture its outcome.
    fn run(&self, command: &str) -> CommandResult;
}

impl<F> CommandRunner for F
where
    F: Fn(&str) -> CommandResult,
{
    fn run(&self, command: &str) -> CommandResult {
        self(command)
    }
}

/// [`CommandRunner`] backed by the user's login shell.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    options: CommandOptions,
}

impl ShellRunner {
    /// Default timeout for a single check or install step.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

    /// Create a runner with captured output and the default timeout.
    pub fn new() -> Self {
        Self {
            options: CommandOptions::captured(Some(Self::DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Create a runner with custom options.
    pub fn with_options(options: CommandOptions) -> Self {
        Self { options }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> CommandResult {
        match execute(command, &self.options) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!("could not run `{}`: {}", command, e);
                CommandResult::failure(None, String::new(), e.to_string(), Duration::ZERO)
            }
        }
    }
}

fn shell_command(command: &str, options: &CommandOptions) -> Command {
    let shell = detect_shell();
    let mut cmd = Command::new(&shell);
    cmd.arg(shell_flag(&shell));
    cmd.arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd
}

/// Execute a shell command.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = shell_command(command, options);
    cmd.stdin(Stdio::null());
    cmd.stdout(if options.capture_stdout {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });
    cmd.stderr(if options.capture_stderr {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });

    let mut child = cmd.spawn().map_err(|_| BasecampError::CommandFailed {
        command: command.to_string(),
        code: None,
    })?;

    let stdout_handle = child.stdout.take().map(spawn_collector);
    let stderr_handle = child.stderr.take().map(spawn_collector);

    let (status, timed_out) = wait_with_timeout(&mut child, options.timeout).map_err(|_| {
        BasecampError::CommandFailed {
            command: command.to_string(),
            code: None,
        }
    })?;

    let stdout = stdout_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();

    let duration = start.elapsed();

    match status {
        Some(status) if status.success() => Ok(CommandResult::success(stdout, stderr, duration)),
        Some(status) => Ok(CommandResult::failure(
            status.code(),
            stdout,
            stderr,
            duration,
        )),
        None => {
            tracing::warn!("`{}` timed out after {:?}", command, duration);
            let mut result = CommandResult::failure(None, stdout, stderr, duration);
            result.timed_out = timed_out;
            Ok(result)
        }
    }
}

fn spawn_collector<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Wait for a child, killing it once `timeout` seconds have passed.
///
/// Returns `(None, true)` when the child was killed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<u64>,
) -> std::io::Result<(Option<std::process::ExitStatus>, bool)> {
    let Some(secs) = timeout else {
        return child.wait().map(|s| (Some(s), false));
    };

    let deadline = Instant::now() + Duration::from_secs(secs);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(Duration::from_millis(25));
    }
}

/// Detect the current shell.
fn detect_shell() -> String {
    super::platform::shell_executable()
        .to_string_lossy()
        .to_string()
}

/// Get the flag to pass commands to the shell.
///
/// Uses `-lic` (interactive login shell) on Unix so that version managers
/// and package managers activated in `.zshrc`/`.bashrc` are on PATH.
/// In CI, uses `-lc` to avoid `cannot set terminal process group` errors
/// when there is no TTY.
fn shell_flag(_shell: &str) -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else if super::is_ci() {
        "-lc"
    } else {
        "-lic"
    }
}
