//! Filesystem layout of a launcher installation.

use std::path::{Path, PathBuf};

use crate::error::{BasecampError, Result};

/// Environment override for the data root.
pub const DATA_DIR_ENV: &str = "BASECAMP_DATA_DIR";

/// Environment override for the shipped bundle directory.
pub const BUNDLE_DIR_ENV: &str = "BASECAMP_BUNDLE_DIR";

/// Where everything lives.
///
/// The data root is writable and owned by the launcher. The bundle dir is
/// shipped with the application and treated as read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    pub data_root: PathBuf,
    pub bundle_dir: PathBuf,
}

impl LauncherPaths {
    /// Build paths from explicit directories.
    pub fn new(data_root: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Resolve paths from CLI overrides, then defaults.
    ///
    /// The CLI layer already folds `BASECAMP_DATA_DIR`/`BASECAMP_BUNDLE_DIR`
    /// into the overrides via clap's `env` support.
    pub fn resolve(data_dir: Option<&Path>, bundle_dir: Option<&Path>) -> Result<Self> {
        let data_root = match data_dir {
            Some(p) => p.to_path_buf(),
            None => default_data_root()?,
        };
        let bundle_dir = match bundle_dir {
            Some(p) => p.to_path_buf(),
            None => default_bundle_dir()?,
        };
        Ok(Self::new(data_root, bundle_dir))
    }

    /// Directory the bundle is extracted into and the service runs from.
    pub fn install_dir(&self) -> PathBuf {
        self.data_root.join("server")
    }

    /// Installed manifest; its build number is the migration commit marker.
    pub fn installed_manifest(&self) -> PathBuf {
        self.data_root.join("bundle.json")
    }

    /// Holding area for user data during an upgrade.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_root.join(".upgrade-backup")
    }

    /// User config (`{"env": {...}}`).
    pub fn config_file(&self) -> PathBuf {
        self.data_root.join("config.json")
    }

    /// Launcher settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.data_root.join(super::settings::SETTINGS_FILE)
    }

    /// Service environment file written before each start.
    pub fn env_file(&self) -> PathBuf {
        self.install_dir().join(".env")
    }

    /// Where the resolved runtime path for `version` is cached.
    pub fn runtime_cache(&self, version: &str) -> PathBuf {
        let safe: String = version
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.data_root.join(format!(".runtime_path_{}", safe))
    }

    /// Manifest shipped with the bundle.
    pub fn bundle_manifest(&self) -> PathBuf {
        self.bundle_dir.join("bundle.json")
    }

    /// Compressed payload shipped with the bundle.
    pub fn bundle_archive(&self) -> PathBuf {
        self.bundle_dir.join("bundle.tar.gz")
    }

    /// Package manifest copied to the data root before installing packages.
    pub fn bundle_package_manifest(&self) -> PathBuf {
        self.bundle_dir.join("package.json")
    }
}

fn default_data_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("basecamp").join("local"))
        .ok_or_else(|| BasecampError::ConfigValidationError {
            message: format!(
                "cannot determine a data directory; set {} or pass --data-dir",
                DATA_DIR_ENV
            ),
        })
}

fn default_bundle_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| BasecampError::ConfigValidationError {
            message: format!(
                "cannot locate the bundle next to {}; set {}",
                exe.display(),
                BUNDLE_DIR_ENV
            ),
        })?;
    Ok(dir.join("bundle"))
}
