//! Locating the managed runtime executable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{write_atomic, LauncherPaths};
use crate::error::{BasecampError, Result};
use crate::shell::CommandRunner;

/// Finds the runtime executable for a version.
pub trait RuntimeLocator {
    fn locate(&self, version: &str) -> Result<PathBuf>;
}

impl<F> RuntimeLocator for F
where
    F: Fn(&str) -> Result<PathBuf>,
{
    fn locate(&self, version: &str) -> Result<PathBuf> {
        self(version)
    }
}

/// Asks nvm for the runtime path, installing the version if needed.
pub struct NvmLocator<R> {
    runner: R,
    runtime: String,
    nvm_dir: String,
}

impl<R: CommandRunner> NvmLocator<R> {
    pub fn new(runner: R, runtime: &str, manager_dir: &Path) -> Self {
        Self {
            runner,
            runtime: runtime.to_string(),
            nvm_dir: manager_dir.display().to_string(),
        }
    }

    fn script(&self, version: &str) -> String {
        format!(
            concat!(
                "unset npm_config_prefix; ",
                r#"export NVM_DIR="{dir}"; [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"; "#,
                "nvm use {v} >/dev/null 2>&1 || nvm install {v} >/dev/null 2>&1; ",
                "nvm use {v} >/dev/null && command -v {bin}"
            ),
            dir = self.nvm_dir,
            v = version,
            bin = self.runtime
        )
    }
}

impl<R: CommandRunner> RuntimeLocator for NvmLocator<R> {
    fn locate(&self, version: &str) -> Result<PathBuf> {
        let result = self.runner.run(&self.script(version));
        let failed = |message: String| BasecampError::RuntimeResolutionFailed {
            runtime: self.runtime.clone(),
            version: version.to_string(),
            message,
        };

        if !result.success {
            return Err(failed(result.last_line()));
        }
        let path = PathBuf::from(result.last_line());
        if !path.is_absolute() || !path.is_file() {
            return Err(failed(format!("nvm reported '{}'", path.display())));
        }
        Ok(path)
    }
}

/// Caches locator answers per version in the data root.
///
/// A cached path is trusted only while the file it names still exists.
pub struct RuntimeResolver<'a, L> {
    locator: L,
    paths: &'a LauncherPaths,
}

impl<'a, L: RuntimeLocator> RuntimeResolver<'a, L> {
    pub fn new(locator: L, paths: &'a LauncherPaths) -> Self {
        Self { locator, paths }
    }

    /// Cached path for `version`, if it is still valid.
    pub fn cached(&self, version: &str) -> Option<PathBuf> {
        cached_path(self.paths, version)
    }

    pub fn resolve(&self, version: &str) -> Result<PathBuf> {
        if let Some(path) = self.cached(version) {
            tracing::debug!("runtime {} from cache: {}", version, path.display());
            return Ok(path);
        }

        let path = self.locator.locate(version)?;
        tracing::info!("runtime {} resolved to {}", version, path.display());
        if let Err(e) = write_atomic(
            &self.paths.runtime_cache(version),
            path.display().to_string().as_bytes(),
        ) {
            tracing::warn!("could not cache runtime path: {}", e);
        }
        Ok(path)
    }
}

/// Read the runtime cache without a locator.
pub fn cached_path(paths: &LauncherPaths, version: &str) -> Option<PathBuf> {
    let content = fs::read_to_string(paths.runtime_cache(version)).ok()?;
    let path = PathBuf::from(content.trim());
    if path.as_os_str().is_empty() || !path.exists() {
        return None;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::CommandResult;
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    fn paths(temp: &TempDir) -> LauncherPaths {
        LauncherPaths::new(temp.path(), temp.path().join("bundle"))
    }

    #[test]
    fn resolves_once_then_uses_cache() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let node = temp.path().join("node");
        fs::write(&node, "").unwrap();

        let calls = Cell::new(0);
        let locator = |_: &str| -> Result<PathBuf> {
            calls.set(calls.get() + 1);
            Ok(node.clone())
        };
        let resolver = RuntimeResolver::new(locator, &paths);

        assert_eq!(resolver.resolve("22").unwrap(), node);
        assert_eq!(resolver.resolve("22").unwrap(), node);
        assert_eq!(calls.get(), 1);
        assert_eq!(resolver.cached("22"), Some(node.clone()));
    }

    #[test]
    fn stale_cache_is_ignored() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        fs::write(paths.runtime_cache("22"), "/nonexistent/bin/node").unwrap();
        let node = temp.path().join("node");
        fs::write(&node, "").unwrap();

        let resolver = RuntimeResolver::new(|_: &str| -> Result<PathBuf> { Ok(node.clone()) }, &paths);

        assert_eq!(resolver.resolve("22").unwrap(), node);
        assert_eq!(
            fs::read_to_string(paths.runtime_cache("22")).unwrap(),
            node.display().to_string()
        );
    }

    #[test]
    fn cache_is_keyed_by_version() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let node = temp.path().join("node");
        fs::write(&node, "").unwrap();
        fs::write(paths.runtime_cache("20"), node.display().to_string()).unwrap();

        assert!(cached_path(&paths, "20").is_some());
        assert!(cached_path(&paths, "22").is_none());
    }

    #[test]
    fn nvm_locator_takes_last_line() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        fs::write(&node, "").unwrap();
        let out = format!("Now using node v22.11.0\n{}\n", node.display());

        let runner = move |cmd: &str| {
            assert!(cmd.contains("nvm use 22"));
            CommandResult::success(out.clone(), String::new(), Duration::ZERO)
        };
        let locator = NvmLocator::new(runner, "node", Path::new("/home/u/.nvm"));

        assert_eq!(locator.locate("22").unwrap(), node);
    }

    #[test]
    fn nvm_locator_failure_is_resolution_error() {
        let runner = |_: &str| {
            CommandResult::failure(Some(3), String::new(), "N/A: version \"99\" is not yet installed".to_string(), Duration::ZERO)
        };
        let locator = NvmLocator::new(runner, "node", Path::new("/home/u/.nvm"));

        match locator.locate("99") {
            Err(BasecampError::RuntimeResolutionFailed { version, message, .. }) => {
                assert_eq!(version, "99");
                assert!(message.contains("not yet installed"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn nvm_locator_rejects_relative_output() {
        let runner =
            |_: &str| CommandResult::success("node".to_string(), String::new(), Duration::ZERO);
        let locator = NvmLocator::new(runner, "node", Path::new("/home/u/.nvm"));
        assert!(locator.locate("22").is_err());
    }
}
