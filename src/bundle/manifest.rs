//! Bundle and installed manifests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::write_atomic;
use crate::error::{BasecampError, Result};

/// `{ "build": <n>, "<runtime>": "<version>", ... }`.
///
/// Keys other than `build` are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub build: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn new(build: u64) -> Self {
        Self {
            build,
            extra: Map::new(),
        }
    }

    /// Read a manifest that must exist.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_optional(path)?.ok_or_else(|| BasecampError::ConfigParseError {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        })
    }

    /// Read a manifest; `None` when the file does not exist.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BasecampError::ConfigParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Write atomically, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
        write_atomic(path, json.as_bytes())
    }

    /// Version string stored under the runtime's name.
    pub fn runtime_version(&self, runtime: &str) -> Option<&str> {
        self.extra.get(runtime).and_then(Value::as_str)
    }

    pub fn set_runtime_version(&mut self, runtime: &str, version: &str) {
        self.extra
            .insert(runtime.to_string(), Value::String(version.to_string()));
    }
}

/// What a migration has to do, decided from the two manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum MigrationPlan {
    /// Nothing installed yet.
    Fresh { to: u64 },
    UpToDate { build: u64 },
    Upgrade { from: u64, to: u64 },
    /// Installed is newer than the bundle. Left alone.
    Downgrade { installed: u64, bundle: u64 },
}

impl MigrationPlan {
    pub fn decide(installed: Option<&Manifest>, bundle: &Manifest) -> Self {
        match installed {
            None => MigrationPlan::Fresh { to: bundle.build },
            Some(i) if i.build == bundle.build => MigrationPlan::UpToDate { build: i.build },
            Some(i) if i.build < bundle.build => MigrationPlan::Upgrade {
                from: i.build,
                to: bundle.build,
            },
            Some(i) => MigrationPlan::Downgrade {
                installed: i.build,
                bundle: bundle.build,
            },
        }
    }

    /// Whether the bundle has to be extracted.
    pub fn requires_install(&self) -> bool {
        matches!(self, MigrationPlan::Fresh { .. } | MigrationPlan::Upgrade { .. })
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationPlan::Fresh { to } => write!(f, "fresh install of build {}", to),
            MigrationPlan::UpToDate { build } => write!(f, "build {} is up to date", build),
            MigrationPlan::Upgrade { from, to } => write!(f, "upgrade from build {} to {}", from, to),
            MigrationPlan::Downgrade { installed, bundle } => write!(
                f,
                "installed build {} is newer than bundle build {}",
                installed, bundle
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_build_and_runtime_version() {
        let m: Manifest = serde_json::from_str(r#"{"build": 12, "node": "22", "channel": "beta"}"#)
            .unwrap();
        assert_eq!(m.build, 12);
        assert_eq!(m.runtime_version("node"), Some("22"));
        assert_eq!(m.runtime_version("deno"), None);
    }

    #[test]
    fn save_preserves_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        fs::write(&path, r#"{"build": 3, "node": "22", "channel": "beta"}"#).unwrap();

        let mut m = Manifest::load(&path).unwrap();
        m.build = 4;
        m.save(&path).unwrap();

        let back = Manifest::load(&path).unwrap();
        assert_eq!(back.build, 4);
        assert_eq!(back.extra["channel"], "beta");
        assert_eq!(back.runtime_version("node"), Some("22"));
    }

    #[test]
    fn missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        assert!(Manifest::load_optional(&path).unwrap().is_none());
        assert!(matches!(
            Manifest::load(&path),
            Err(BasecampError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        fs::write(&path, "{build:").unwrap();
        assert!(matches!(
            Manifest::load_optional(&path),
            Err(BasecampError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn plan_decisions() {
        let bundle = Manifest::new(5);
        assert_eq!(
            MigrationPlan::decide(None, &bundle),
            MigrationPlan::Fresh { to: 5 }
        );
        assert_eq!(
            MigrationPlan::decide(Some(&Manifest::new(5)), &bundle),
            MigrationPlan::UpToDate { build: 5 }
        );
        assert_eq!(
            MigrationPlan::decide(Some(&Manifest::new(2)), &bundle),
            MigrationPlan::Upgrade { from: 2, to: 5 }
        );
        let down = MigrationPlan::decide(Some(&Manifest::new(9)), &bundle);
        assert!(!down.requires_install());
        assert_eq!(
            down.to_string(),
            "installed build 9 is newer than bundle build 5"
        );
    }
}
