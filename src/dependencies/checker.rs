//! Host dependency checks.
//!
//! Every check is a shell command run through a [`CommandRunner`], so tests
//! can stand in a fake host. Checks never fail: a command that cannot run
//! simply reports the dependency as missing.

use crate::config::RuntimeSettings;
use crate::error::{BasecampError, Result};
use crate::shell::{CommandResult, CommandRunner, Platform};

use super::item::{DependencyItem, DependencyKey, DependencyReport, PythonInfo};

const BREW_INSTALL: &str = r#"/bin/bash -c "$(curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)""#;
const BREW_SHELLENV: &str = r#"echo 'eval "$(/opt/homebrew/bin/brew shellenv)"' >> ~/.zprofile && eval "$(/opt/homebrew/bin/brew shellenv)""#;
const NVM_INSTALL: &str =
    "curl -fsSL https://raw.githubusercontent.com/nvm-sh/nvm/v0.39.7/install.sh | bash";
const MINICONDA_LINUX: &str =
    "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh";

/// Facts that later checks' remediation depends on.
#[derive(Debug, Clone, Copy, Default)]
struct HostFacts {
    brew: bool,
    nvm: bool,
}

/// Evaluates host dependencies in a fixed order.
pub struct DependencyChecker<R> {
    runner: R,
    platform: Platform,
    nvm_dir: String,
    runtime_version: String,
    rc_file: String,
}

impl<R: CommandRunner> DependencyChecker<R> {
    pub fn new(runner: R, platform: Platform) -> Self {
        let defaults = RuntimeSettings::default();
        let rc_file = match platform {
            Platform::MacOS => "~/.zshrc",
            _ => "~/.bashrc",
        };
        Self {
            runner,
            platform,
            nvm_dir: shell_path(&defaults.manager_dir),
            runtime_version: defaults.default_version,
            rc_file: rc_file.to_string(),
        }
    }

    /// Use the runtime manager home and the version the bundle requires.
    pub fn with_runtime(mut self, settings: &RuntimeSettings, version: &str) -> Self {
        self.nvm_dir = shell_path(&settings.manager_dir);
        self.runtime_version = version.to_string();
        self
    }

    /// Shell rc file that activation lines are appended to.
    pub fn with_rc_file(mut self, rc_file: &str) -> Self {
        self.rc_file = rc_file.to_string();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Keys that apply to this platform, in check order.
    pub fn keys(&self) -> Vec<DependencyKey> {
        DependencyKey::ORDER
            .into_iter()
            .filter(|key| {
                self.platform == Platform::MacOS
                    || !matches!(key, DependencyKey::XcodeClt | DependencyKey::Brew)
            })
            .collect()
    }

    /// Check every dependency, plus the Python environment.
    pub fn check_all(&self) -> DependencyReport {
        let mut facts = HostFacts::default();
        let mut items = Vec::new();

        for key in self.keys() {
            let item = self.check_with(key, facts);
            match key {
                DependencyKey::Brew => facts.brew = item.installed,
                DependencyKey::Nvm => facts.nvm = item.installed,
                _ => {}
            }
            tracing::debug!(
                "dependency {}: {}",
                key,
                if item.installed { "ok" } else { "missing" }
            );
            items.push(item);
        }

        // On macOS `python3` is a shim that pops the CLT installer when the
        // tools are missing.
        let python = if self.platform == Platform::MacOS
            && !items
                .iter()
                .any(|i| i.key == DependencyKey::XcodeClt && i.installed)
        {
            PythonInfo::default()
        } else {
            self.python_info()
        };

        DependencyReport::new(items, python)
    }

    /// Re-check a single dependency.
    pub fn check_one(&self, key: DependencyKey) -> Result<DependencyItem> {
        if !self.keys().contains(&key) {
            return Err(BasecampError::DependencyCheckFailed {
                key: key.to_string(),
                message: format!("not checked on {:?}", self.platform),
            });
        }

        let facts = HostFacts {
            brew: match key {
                DependencyKey::Conda | DependencyKey::Coreutils | DependencyKey::Timeout => {
                    self.brew_available()
                }
                _ => false,
            },
            nvm: key == DependencyKey::Node && self.check_nvm().installed,
        };
        Ok(self.check_with(key, facts))
    }

    /// Whether Homebrew is usable on this host.
    pub fn brew_available(&self) -> bool {
        self.platform == Platform::MacOS && self.run("brew --version").success
    }

    /// Locate the Python interpreter and pip, preferring conda's base env.
    pub fn python_info(&self) -> PythonInfo {
        if self.run("command -v conda").success {
            let base = self.run("conda info --base").last_line();
            let base = if base.is_empty() {
                "$HOME/miniconda3".to_string()
            } else {
                base
            };
            let python_path = format!("{}/bin/python", base);
            let pip_path = format!("{}/bin/pip", base);
            let version = self.run(&format!("\"{}\" --version 2>&1", python_path));
            let pip = self.run(&format!("\"{}\" --version 2>&1", pip_path));
            return PythonInfo {
                ok: version.success && pip.success,
                version: version.last_line(),
                python_path,
                pip_path,
            };
        }

        let version = self.run("python3 --version 2>&1 || python --version 2>&1");
        let pip_path = self
            .run("command -v pip3 || command -v pip || true")
            .first_line();
        let python_path = self
            .run("command -v python3 || command -v python || true")
            .first_line();
        PythonInfo {
            ok: version.success && !pip_path.is_empty(),
            version: version.last_line(),
            python_path,
            pip_path,
        }
    }

    /// Wrap `command` so it runs with the version manager loaded.
    pub fn nvm_run(&self, command: &str) -> String {
        format!(
            r#"export NVM_DIR="{}"; [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"; {}"#,
            self.nvm_dir, command
        )
    }

    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    fn run(&self, command: &str) -> CommandResult {
        tracing::trace!("check: {}", command);
        self.runner.run(command)
    }

    fn check_with(&self, key: DependencyKey, facts: HostFacts) -> DependencyItem {
        match key {
            DependencyKey::XcodeClt => self.check_xcode(),
            DependencyKey::Brew => self.check_brew(),
            DependencyKey::Conda => self.check_conda(facts),
            DependencyKey::Coreutils => self.check_coreutils(facts),
            DependencyKey::Timeout => self.check_timeout(facts),
            DependencyKey::Nvm => self.check_nvm(),
            DependencyKey::Node => self.check_node(facts),
        }
    }

    fn check_xcode(&self) -> DependencyItem {
        let result = self.run("xcode-select -p");
        let installed = result.success && !result.output().is_empty();
        DependencyItem {
            key: DependencyKey::XcodeClt,
            label: "Xcode Command Line Tools".to_string(),
            installed,
            version_info: if installed { result.output() } else { String::new() },
            auto_fix: None,
            manual_fix: Some(vec!["xcode-select --install".to_string()]),
            note: "If the tools are broken: sudo xcode-select --reset".to_string(),
        }
    }

    fn check_brew(&self) -> DependencyItem {
        let result = self.run("brew --version");
        DependencyItem {
            key: DependencyKey::Brew,
            label: "Homebrew".to_string(),
            installed: result.success,
            version_info: version_of(&result, CommandResult::first_line),
            // The installer asks for a password; it has to run in a terminal.
            auto_fix: None,
            manual_fix: Some(vec![BREW_INSTALL.to_string(), BREW_SHELLENV.to_string()]),
            note: "Homebrew installs interactively and may ask for your password".to_string(),
        }
    }

    fn check_conda(&self, facts: HostFacts) -> DependencyItem {
        let result = self.run("command -v conda >/dev/null && conda --version");
        let path_line = format!(
            r#"echo 'export PATH="$HOME/miniconda3/bin:$PATH"' >> {}"#,
            self.rc_file
        );

        let (auto_fix, manual_fix) = match self.platform {
            Platform::MacOS if facts.brew => (
                Some(vec!["brew install --cask miniconda".to_string(), path_line]),
                None,
            ),
            Platform::MacOS => (
                None,
                Some(vec![
                    "# Install Homebrew first".to_string(),
                    "brew install --cask miniconda".to_string(),
                    path_line,
                ]),
            ),
            _ => (
                Some(vec![
                    format!("curl -fsSLo /tmp/miniconda.sh {}", MINICONDA_LINUX),
                    "bash /tmp/miniconda.sh -b -p $HOME/miniconda3".to_string(),
                    path_line,
                ]),
                None,
            ),
        };

        DependencyItem {
            key: DependencyKey::Conda,
            label: "Miniconda".to_string(),
            installed: result.success,
            version_info: version_of(&result, CommandResult::last_line),
            auto_fix,
            manual_fix,
            note: "Provides the Python environment used by agent tools".to_string(),
        }
    }

    fn check_coreutils(&self, facts: HostFacts) -> DependencyItem {
        let (check, auto_fix, manual_fix) = match self.platform {
            Platform::MacOS if facts.brew => (
                "command -v greadlink >/dev/null && greadlink --version",
                Some(vec!["brew install coreutils".to_string()]),
                None,
            ),
            Platform::MacOS => (
                "command -v greadlink >/dev/null && greadlink --version",
                None,
                Some(vec![
                    "# Install Homebrew first".to_string(),
                    "brew install coreutils".to_string(),
                ]),
            ),
            _ => (
                "readlink --version",
                None,
                Some(vec![
                    "# Install coreutils with your package manager".to_string(),
                    "sudo apt-get install -y coreutils".to_string(),
                ]),
            ),
        };

        let result = self.run(check);
        DependencyItem {
            key: DependencyKey::Coreutils,
            label: "GNU coreutils".to_string(),
            installed: result.success,
            version_info: version_of(&result, CommandResult::first_line),
            auto_fix,
            manual_fix,
            note: String::new(),
        }
    }

    fn check_timeout(&self, facts: HostFacts) -> DependencyItem {
        let result = self.run(
            "(command -v timeout >/dev/null && timeout --version) || \
             (command -v gtimeout >/dev/null && gtimeout --version)",
        );
        let alias = format!("echo 'alias timeout=gtimeout' >> {}", self.rc_file);

        let (auto_fix, manual_fix) = match self.platform {
            Platform::MacOS if facts.brew => (
                Some(vec!["brew install coreutils".to_string(), alias.clone()]),
                Some(vec![
                    "brew install coreutils".to_string(),
                    "# Homebrew installs it as gtimeout; alias it".to_string(),
                    alias,
                ]),
            ),
            Platform::MacOS => (
                None,
                Some(vec![
                    "# Install Homebrew first".to_string(),
                    "brew install coreutils".to_string(),
                    alias,
                ]),
            ),
            _ => (
                None,
                Some(vec![
                    "# timeout ships with coreutils".to_string(),
                    "sudo apt-get install -y coreutils".to_string(),
                ]),
            ),
        };

        DependencyItem {
            key: DependencyKey::Timeout,
            label: "timeout".to_string(),
            installed: result.success,
            version_info: version_of(&result, CommandResult::first_line),
            auto_fix,
            manual_fix,
            note: String::new(),
        }
    }

    fn check_nvm(&self) -> DependencyItem {
        let result = self.run(&self.nvm_run("command -v nvm >/dev/null && nvm --version"));
        let (installed, version_info) = if result.success {
            (true, version_of(&result, CommandResult::last_line))
        } else {
            let dir = self.run(&format!(r#"[ -d "{}" ] && echo installed"#, self.nvm_dir));
            (dir.success, version_of(&dir, CommandResult::last_line))
        };

        let auto_fix = vec![
            NVM_INSTALL.to_string(),
            format!(
                r#"echo 'export NVM_DIR="{}"' >> {}"#,
                self.nvm_dir, self.rc_file
            ),
            format!(
                r#"echo '[ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"' >> {}"#,
                self.rc_file
            ),
        ];

        DependencyItem {
            key: DependencyKey::Nvm,
            label: "nvm".to_string(),
            installed,
            version_info,
            auto_fix: Some(auto_fix),
            manual_fix: None,
            note: "nvm manages the Node.js version the local service runs on".to_string(),
        }
    }

    fn check_node(&self, facts: HostFacts) -> DependencyItem {
        let version = &self.runtime_version;
        // Resolves only installed versions; `nvm ls` also lists LTS aliases
        // for versions that are not installed.
        let resolved = self.run(&self.nvm_run(&format!("nvm version {}", version)));
        let version_info = version_of(&resolved, CommandResult::first_line);
        let installed = version_info.starts_with('v');
        let version_info = if installed { version_info } else { String::new() };

        let steps = [
            format!("nvm install {}", version),
            format!("nvm alias default {}", version),
        ];
        let mut manual: Vec<String> = Vec::new();
        if !facts.nvm {
            manual.push("# Install nvm first".to_string());
        }
        manual.extend(steps.iter().cloned());
        manual.push(format!("nvm use {}", version));

        DependencyItem {
            key: DependencyKey::Node,
            label: format!("Node.js {}", version),
            installed,
            version_info,
            auto_fix: facts
                .nvm
                .then(|| steps.iter().map(|s| self.nvm_run(s)).collect()),
            manual_fix: Some(manual),
            note: String::new(),
        }
    }
}

fn version_of(result: &CommandResult, line: fn(&CommandResult) -> String) -> String {
    if result.success {
        line(result)
    } else {
        String::new()
    }
}

/// `~/x` → `$HOME/x`, so the path expands inside double quotes.
fn shell_path(dir: &str) -> String {
    match dir.strip_prefix('~') {
        Some(rest) => format!("$HOME{}", rest),
        None => dir.to_string(),
    }
}
