//! Configuration for the launcher.
//!
//! - Launcher settings (`launcher.yml`) in [`settings`]
//! - Filesystem layout in [`paths`]
//! - User config (`config.json`) in [`app_config`]
//! - Service `.env` merging in [`env_file`]
//!
//! # Example
//!
//! ```
//! use basecamp::config::{load_settings, LauncherPaths};
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! std::fs::write(temp.path().join("launcher.yml"), "default_port: 4000").unwrap();
//!
//! let paths = LauncherPaths::new(temp.path(), temp.path().join("bundle"));
//! let settings = load_settings(&paths.settings_file()).unwrap();
//! assert_eq!(settings.default_port, 4000);
//! assert_eq!(settings.readiness_marker, "READY:");
//! ```

pub mod app_config;
pub mod env_file;
pub mod paths;
pub mod settings;

pub use app_config::{parse_assignment, AppConfig};
pub use env_file::{merge_env_content, merge_env_file, EnvFileParser};
pub use paths::{LauncherPaths, BUNDLE_DIR_ENV, DATA_DIR_ENV};
pub use settings::{
    expand_home, load_settings, parse_settings, validate, Endpoint, LauncherSettings,
    NetworkSettings, RuntimeSettings, SETTINGS_FILE,
};

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Write `content` to `path` via a sibling temp file and a rename.
///
/// Readers see either the old file or the new one, never a torn write.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let temp_path = path.with_file_name(tmp_name);

    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_replaces_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bundle.json");
        fs::write(&path, "{\"build\":1}").unwrap();

        write_atomic(&path, b"{\"build\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"build\":2}");
        assert!(!temp.path().join("bundle.json.tmp").exists());
    }

    #[test]
    fn write_atomic_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
    }
}
