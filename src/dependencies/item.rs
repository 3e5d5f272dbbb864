//! Dependency check results.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Host dependencies in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKey {
    XcodeClt,
    Brew,
    Conda,
    Coreutils,
    Timeout,
    Nvm,
    Node,
}

impl DependencyKey {
    /// Every key, in the order the wizard resolves them.
    pub const ORDER: [DependencyKey; 7] = [
        DependencyKey::XcodeClt,
        DependencyKey::Brew,
        DependencyKey::Conda,
        DependencyKey::Coreutils,
        DependencyKey::Timeout,
        DependencyKey::Nvm,
        DependencyKey::Node,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKey::XcodeClt => "xcode_clt",
            DependencyKey::Brew => "brew",
            DependencyKey::Conda => "conda",
            DependencyKey::Coreutils => "coreutils",
            DependencyKey::Timeout => "timeout",
            DependencyKey::Nvm => "nvm",
            DependencyKey::Node => "node",
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DependencyKey::ORDER
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .or(match normalized.as_str() {
                "xcode" => Some(DependencyKey::XcodeClt),
                "homebrew" => Some(DependencyKey::Brew),
                "miniconda" => Some(DependencyKey::Conda),
                _ => None,
            })
            .ok_or_else(|| {
                let known: Vec<_> = DependencyKey::ORDER.iter().map(|k| k.as_str()).collect();
                format!("unknown dependency '{}' (known: {})", s, known.join(", "))
            })
    }
}

/// Result of checking one dependency. Regenerated on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyItem {
    pub key: DependencyKey,
    pub label: String,
    pub installed: bool,
    /// Detected version line, empty when missing.
    pub version_info: String,
    /// Steps the launcher can run itself.
    pub auto_fix: Option<Vec<String>>,
    /// Steps the user runs in a terminal.
    pub manual_fix: Option<Vec<String>>,
    pub note: String,
}

impl DependencyItem {
    /// Instructions to show for the manual path.
    ///
    /// Falls back to the automatic steps, which are also valid terminal
    /// commands.
    pub fn manual_steps(&self) -> Vec<String> {
        self.manual_fix
            .clone()
            .or_else(|| self.auto_fix.clone())
            .unwrap_or_default()
    }

    pub fn has_auto_fix(&self) -> bool {
        self.auto_fix.as_ref().is_some_and(|steps| !steps.is_empty())
    }
}

/// Python environment used by services that need pip packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PythonInfo {
    pub ok: bool,
    pub version: String,
    pub python_path: String,
    pub pip_path: String,
}

/// Full check result. Ephemeral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub all_satisfied: bool,
    pub items: Vec<DependencyItem>,
    pub python: PythonInfo,
}

impl DependencyReport {
    pub fn new(items: Vec<DependencyItem>, python: PythonInfo) -> Self {
        Self {
            all_satisfied: items.iter().all(|i| i.installed),
            items,
            python,
        }
    }

    /// First unsatisfied item in check order.
    pub fn first_missing(&self) -> Option<&DependencyItem> {
        self.items.iter().find(|i| !i.installed)
    }

    pub fn missing(&self) -> impl Iterator<Item = &DependencyItem> {
        self.items.iter().filter(|i| !i.installed)
    }

    pub fn get(&self, key: DependencyKey) -> Option<&DependencyItem> {
        self.items.iter().find(|i| i.key == key)
    }

    /// "Missing 2: conda, nvm" or "All dependencies ready".
    pub fn summary(&self) -> String {
        let missing: Vec<&str> = self.missing().map(|i| i.label.as_str()).collect();
        if missing.is_empty() {
            "All dependencies ready".to_string()
        } else {
            format!("Missing {}: {}", missing.len(), missing.join(", "))
        }
    }
}
