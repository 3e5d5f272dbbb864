//! Platform and shell detection.

use std::path::{Path, PathBuf};

/// Host platform, used to pick dependency checks and binary names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    /// Detect the current platform.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// File name of a platform binary (`frpc` → `frpc.exe` on Windows).
    pub fn binary_name(&self, name: &str) -> String {
        match self {
            Platform::Windows if !name.ends_with(".exe") => format!("{}.exe", name),
            _ => name.to_string(),
        }
    }
}

/// Information about the user's login shell.
#[derive(Debug, Clone)]
pub struct ShellInfo {
    /// Shell executable path.
    pub executable: PathBuf,

    /// Shell name (bash, zsh, fish, powershell, cmd).
    pub name: ShellType,

    /// Config files that affect this shell, most specific first.
    pub config_files: Vec<PathBuf>,
}

impl ShellInfo {
    /// The rc file that install steps should append activation lines to.
    pub fn rc_file(&self) -> Option<&Path> {
        self.config_files.first().map(PathBuf::as_path)
    }
}

/// Known shell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Cmd,
    Unknown,
}

impl ShellType {
    /// Parse shell type from executable name.
    pub fn from_executable(exe: &str) -> Self {
        let name = Path::new(exe)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match name.as_str() {
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            "powershell" | "pwsh" => ShellType::PowerShell,
            "cmd" => ShellType::Cmd,
            _ => ShellType::Unknown,
        }
    }
}

/// Detect the current shell environment.
pub fn detect_shell() -> ShellInfo {
    let executable = shell_executable();
    let shell_type = ShellType::from_executable(&executable.to_string_lossy());

    ShellInfo {
        executable,
        name: shell_type,
        config_files: config_files(shell_type),
    }
}

/// Path of the user's shell (`$SHELL`, `%COMSPEC%`).
pub fn shell_executable() -> PathBuf {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cmd.exe"))
    } else {
        std::env::var("SHELL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/bin/sh"))
    }
}

fn config_files(shell_type: ShellType) -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_default();

    match shell_type {
        ShellType::Bash => vec![
            home.join(".bashrc"),
            home.join(".bash_profile"),
            home.join(".profile"),
        ],
        // macOS defaults to zsh, so an unknown shell gets the zsh files too.
        ShellType::Zsh | ShellType::Unknown => vec![home.join(".zshrc"), home.join(".zprofile")],
        ShellType::Fish => vec![home.join(".config/fish/config.fish")],
        ShellType::PowerShell | ShellType::Cmd => vec![],
    }
}

/// Check if running in a CI environment.
///
/// CI forces non-interactive mode in `main()` and switches the shell
/// flag to a non-interactive login shell.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}
