//! Bundle migration into the install directory.
//!
//! A migration runs these stages strictly in order, each one finished on
//! disk before the next starts:
//!
//! 1. move user data directories out of the install dir into the holding dir
//! 2. delete the install dir
//! 3. extract the bundle archive
//! 4. move user data back (or create the directory)
//! 5. mark platform binaries executable
//! 6. copy the package manifest to the data root
//! 7. install runtime packages
//! 8. write the installed manifest
//! 9. delete the holding dir
//!
//! The installed manifest is the commit marker. Any failure before stage 8
//! leaves the previous manifest in place, so the next launch retries the
//! whole migration; user data still in the holding dir is restored then.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::LauncherPaths;
use crate::error::{BasecampError, Result};
use crate::shell::{execute, CommandOptions, Platform};

use super::archive;
use super::fsops::{move_dir, remove_path, set_executable};
use super::manifest::{Manifest, MigrationPlan};

/// Migration stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Backup,
    RemoveInstall,
    Extract,
    Restore,
    Permissions,
    PackageManifest,
    PackageInstall,
    Commit,
    Cleanup,
}

impl MigrationStage {
    /// Status line shown while the stage runs.
    pub fn status(&self) -> &'static str {
        match self {
            MigrationStage::Backup => "Backing up your data...",
            MigrationStage::RemoveInstall => "Removing previous version...",
            MigrationStage::Extract => "Unpacking bundle files...",
            MigrationStage::Restore => "Restoring your data...",
            MigrationStage::Permissions => "Setting permissions...",
            MigrationStage::PackageManifest => "Copying package manifest...",
            MigrationStage::PackageInstall => "Installing packages...",
            MigrationStage::Commit => "Recording installed version...",
            MigrationStage::Cleanup => "Cleaning up...",
        }
    }
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationStage::Backup => "backing up user data",
            MigrationStage::RemoveInstall => "removing the install directory",
            MigrationStage::Extract => "extracting the bundle",
            MigrationStage::Restore => "restoring user data",
            MigrationStage::Permissions => "setting executable permissions",
            MigrationStage::PackageManifest => "copying the package manifest",
            MigrationStage::PackageInstall => "installing packages",
            MigrationStage::Commit => "writing the installed manifest",
            MigrationStage::Cleanup => "removing the backup",
        };
        f.write_str(s)
    }
}

/// Installs the service's runtime packages in a directory.
pub trait PackageInstaller {
    fn install(&self, dir: &Path) -> Result<()>;
}

impl<F> PackageInstaller for F
where
    F: Fn(&Path) -> Result<()>,
{
    fn install(&self, dir: &Path) -> Result<()> {
        self(dir)
    }
}

/// Runs the package install command in a login shell.
#[derive(Debug, Clone)]
pub struct ShellPackageInstaller {
    command: String,
    timeout_secs: u64,
}

impl ShellPackageInstaller {
    /// Package installs can download a lot; allow up to half an hour.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PackageInstaller for ShellPackageInstaller {
    fn install(&self, dir: &Path) -> Result<()> {
        let options = CommandOptions {
            cwd: Some(dir.to_path_buf()),
            ..CommandOptions::captured(Some(self.timeout_secs))
        };
        let result = execute(&self.command, &options)?;
        if result.success {
            Ok(())
        } else {
            tracing::warn!("package install failed: {}", result.last_line());
            Err(BasecampError::CommandFailed {
                command: self.command.clone(),
                code: result.exit_code,
            })
        }
    }
}

/// What [`BundleMigrator::migrate`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub plan: MigrationPlan,
    /// Installed build after the call.
    pub build: u64,
    /// Whether anything on disk changed.
    pub performed: bool,
}

type StageHook<'a> = Box<dyn Fn(MigrationStage) -> Result<()> + 'a>;

/// Moves a bundle into the install directory, preserving user data.
pub struct BundleMigrator<'a, P> {
    paths: &'a LauncherPaths,
    user_dirs: Vec<String>,
    executables: Vec<String>,
    platform: Platform,
    packages: P,
    hook: Option<StageHook<'a>>,
}

impl<'a, P: PackageInstaller> BundleMigrator<'a, P> {
    pub fn new(paths: &'a LauncherPaths, packages: P) -> Self {
        Self {
            paths,
            user_dirs: Vec::new(),
            executables: Vec::new(),
            platform: Platform::current(),
            packages,
            hook: None,
        }
    }

    /// Directories inside the install dir that belong to the user.
    pub fn user_dirs(mut self, dirs: &[String]) -> Self {
        self.user_dirs = dirs.to_vec();
        self
    }

    /// Install-relative paths that must be executable.
    pub fn executables(mut self, files: &[String]) -> Self {
        self.executables = files.to_vec();
        self
    }

    /// Called before each stage. An error aborts the migration at that point.
    pub fn on_stage(mut self, hook: impl Fn(MigrationStage) -> Result<()> + 'a) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Read both manifests and decide what to do.
    pub fn plan(&self) -> Result<(MigrationPlan, Manifest)> {
        let bundle = Manifest::load(&self.paths.bundle_manifest())?;
        let installed = Manifest::load_optional(&self.paths.installed_manifest())?;
        Ok((MigrationPlan::decide(installed.as_ref(), &bundle), bundle))
    }

    /// Bring the install dir to the bundle's build.
    pub fn migrate(&self) -> Result<MigrationOutcome> {
        let (plan, bundle) = self.plan()?;
        tracing::info!("bundle migration: {}", plan);

        match plan {
            MigrationPlan::UpToDate { build } => {
                self.discard_empty_holding();
                Ok(MigrationOutcome {
                    plan,
                    build,
                    performed: false,
                })
            }
            MigrationPlan::Downgrade { installed, .. } => {
                tracing::warn!("{}; leaving the install untouched", plan);
                Ok(MigrationOutcome {
                    plan,
                    build: installed,
                    performed: false,
                })
            }
            MigrationPlan::Fresh { .. } | MigrationPlan::Upgrade { .. } => {
                self.install(&bundle)?;
                Ok(MigrationOutcome {
                    plan,
                    build: bundle.build,
                    performed: true,
                })
            }
        }
    }

    fn install(&self, bundle: &Manifest) -> Result<()> {
        let install_dir = self.paths.install_dir();
        let holding = self.paths.backup_dir();

        self.stage(MigrationStage::Backup, || {
            for dir in &self.user_dirs {
                let live = install_dir.join(dir);
                let held = holding.join(dir);
                if held.exists() {
                    // Left over from an interrupted migration; that copy wins.
                    tracing::warn!("keeping earlier backup of {}", dir);
                    continue;
                }
                if live.exists() {
                    move_dir(&live, &held)?;
                }
            }
            Ok(())
        })?;

        self.stage(MigrationStage::RemoveInstall, || {
            remove_path(&install_dir)?;
            Ok(())
        })?;

        self.stage(MigrationStage::Extract, || {
            archive::extract(&self.paths.bundle_archive(), &install_dir)?;
            Ok(())
        })?;

        self.stage(MigrationStage::Restore, || {
            for dir in &self.user_dirs {
                let live = install_dir.join(dir);
                let held = holding.join(dir);
                if held.exists() {
                    move_dir(&held, &live)?;
                } else {
                    fs::create_dir_all(&live)?;
                }
            }
            Ok(())
        })?;

        self.stage(MigrationStage::Permissions, || {
            for file in &self.executables {
                let path = install_dir.join(self.platform.binary_name(file));
                if !set_executable(&path)? {
                    tracing::warn!("executable {} not found in bundle", path.display());
                }
            }
            Ok(())
        })?;

        self.stage(MigrationStage::PackageManifest, || {
            let source = self.paths.bundle_package_manifest();
            if source.is_file() {
                fs::create_dir_all(&self.paths.data_root)?;
                fs::copy(&source, self.paths.data_root.join("package.json"))?;
            } else {
                tracing::debug!("no package manifest in bundle");
            }
            Ok(())
        })?;

        self.stage(MigrationStage::PackageInstall, || {
            if self.paths.data_root.join("package.json").is_file() {
                self.packages.install(&self.paths.data_root)?;
            }
            Ok(())
        })?;

        self.stage(MigrationStage::Commit, || {
            bundle.save(&self.paths.installed_manifest())
        })?;

        // Committed; a leftover holding dir is only a warning from here on.
        if let Err(e) = self.stage(MigrationStage::Cleanup, || {
            remove_path(&holding)?;
            Ok(())
        }) {
            tracing::warn!("{}", e);
        }

        Ok(())
    }

    fn stage(&self, stage: MigrationStage, op: impl FnOnce() -> Result<()>) -> Result<()> {
        if let Some(hook) = &self.hook {
            hook(stage)?;
        }
        tracing::debug!("migration stage: {}", stage);
        op().map_err(|e| match e {
            e @ BasecampError::MigrationError { .. } => e,
            other => BasecampError::migration(stage.to_string(), other),
        })
    }

    fn discard_empty_holding(&self) {
        let holding = self.paths.backup_dir();
        if holding.is_dir() && fs::remove_dir(&holding).is_err() {
            tracing::warn!(
                "backup directory {} is not empty; leaving it in place",
                holding.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::archive::pack;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        paths: LauncherPaths,
        payload: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let paths = LauncherPaths::new(temp.path().join("data"), temp.path().join("bundle"));
        let payload = temp.path().join("payload");
        fs::create_dir_all(payload.join("agents/builtin")).unwrap();
        fs::create_dir_all(payload.join("frpc")).unwrap();
        fs::write(payload.join("start.js"), "v1").unwrap();
        fs::write(payload.join("agents/builtin/agent.json"), "seed").unwrap();
        fs::write(payload.join("frpc/frpc"), "bin").unwrap();
        pack(&payload, &paths.bundle_dir, None).unwrap();
        Fixture {
            _temp: temp,
            paths,
            payload,
        }
    }

    fn no_packages(_: &Path) -> Result<()> {
        Ok(())
    }

    fn migrator(paths: &LauncherPaths) -> BundleMigrator<'_, fn(&Path) -> Result<()>> {
        BundleMigrator::new(paths, no_packages as fn(&Path) -> Result<()>)
            .user_dirs(&["agents".to_string(), "filehub".to_string()])
            .executables(&["frpc/frpc".to_string()])
    }

    #[test]
    fn fresh_install_extracts_and_commits() {
        let f = fixture();
        let outcome = migrator(&f.paths).migrate().unwrap();

        assert_eq!(outcome.plan, MigrationPlan::Fresh { to: 1 });
        assert!(outcome.performed);
        let install = f.paths.install_dir();
        assert_eq!(fs::read_to_string(install.join("start.js")).unwrap(), "v1");
        assert!(install.join("agents/builtin/agent.json").exists());
        assert!(install.join("filehub").is_dir());
        assert_eq!(
            Manifest::load(&f.paths.installed_manifest()).unwrap().build,
            1
        );
        assert!(!f.paths.backup_dir().exists());
    }

    #[test]
    fn up_to_date_runs_no_stage() {
        let f = fixture();
        migrator(&f.paths).migrate().unwrap();

        let stages = RefCell::new(Vec::new());
        let outcome = migrator(&f.paths)
            .on_stage(|s| {
                stages.borrow_mut().push(s);
                Ok(())
            })
            .migrate()
            .unwrap();

        assert!(!outcome.performed);
        assert!(stages.borrow().is_empty());
    }

    #[test]
    fn stages_run_in_order() {
        let f = fixture();
        let stages = RefCell::new(Vec::new());
        migrator(&f.paths)
            .on_stage(|s| {
                stages.borrow_mut().push(s);
                Ok(())
            })
            .migrate()
            .unwrap();

        use MigrationStage::*;
        assert_eq!(
            *stages.borrow(),
            [
                Backup,
                RemoveInstall,
                Extract,
                Restore,
                Permissions,
                PackageManifest,
                PackageInstall,
                Commit,
                Cleanup
            ]
        );
    }

    #[test]
    fn upgrade_keeps_user_data_over_bundle_seed() {
        let f = fixture();
        migrator(&f.paths).migrate().unwrap();
        let install = f.paths.install_dir();
        fs::write(install.join("agents/builtin/agent.json"), "edited").unwrap();
        fs::write(install.join("filehub/notes.txt"), "mine").unwrap();

        fs::write(f.payload.join("start.js"), "v2").unwrap();
        pack(&f.payload, &f.paths.bundle_dir, None).unwrap();
        let outcome = migrator(&f.paths).migrate().unwrap();

        assert_eq!(outcome.plan, MigrationPlan::Upgrade { from: 1, to: 2 });
        assert_eq!(fs::read_to_string(install.join("start.js")).unwrap(), "v2");
        assert_eq!(
            fs::read_to_string(install.join("agents/builtin/agent.json")).unwrap(),
            "edited"
        );
        assert_eq!(
            fs::read_to_string(install.join("filehub/notes.txt")).unwrap(),
            "mine"
        );
    }

    #[test]
    fn failure_before_commit_keeps_old_manifest_and_backup() {
        let f = fixture();
        migrator(&f.paths).migrate().unwrap();
        fs::write(f.paths.install_dir().join("filehub/notes.txt"), "mine").unwrap();
        pack(&f.payload, &f.paths.bundle_dir, None).unwrap();

        let err = migrator(&f.paths)
            .on_stage(|s| match s {
                MigrationStage::Extract => Err(BasecampError::migration(s.to_string(), "disk full")),
                _ => Ok(()),
            })
            .migrate()
            .unwrap_err();

        assert!(matches!(err, BasecampError::MigrationError { .. }));
        assert_eq!(
            Manifest::load(&f.paths.installed_manifest()).unwrap().build,
            1
        );
        assert!(f.paths.backup_dir().join("filehub/notes.txt").exists());

        // Next launch retries and restores the held data.
        migrator(&f.paths).migrate().unwrap();
        assert_eq!(
            fs::read_to_string(f.paths.install_dir().join("filehub/notes.txt")).unwrap(),
            "mine"
        );
        assert_eq!(
            Manifest::load(&f.paths.installed_manifest()).unwrap().build,
            2
        );
    }

    #[test]
    fn downgrade_is_left_alone() {
        let f = fixture();
        Manifest::new(9).save(&f.paths.installed_manifest()).unwrap();

        let outcome = migrator(&f.paths).migrate().unwrap();

        assert!(!outcome.performed);
        assert_eq!(outcome.build, 9);
        assert!(!f.paths.install_dir().exists());
    }

    #[test]
    fn package_install_runs_in_data_root() {
        let f = fixture();
        fs::write(f.paths.bundle_package_manifest(), "{}").unwrap();
        let seen = RefCell::new(None);

        BundleMigrator::new(&f.paths, |dir: &Path| -> Result<()> {
            *seen.borrow_mut() = Some(dir.to_path_buf());
            Ok(())
        })
        .migrate()
        .unwrap();

        assert_eq!(seen.borrow().as_deref(), Some(f.paths.data_root.as_path()));
        assert!(f.paths.data_root.join("package.json").exists());
    }

    #[test]
    fn package_install_failure_is_a_migration_error() {
        let f = fixture();
        fs::write(f.paths.bundle_package_manifest(), "{}").unwrap();

        let err = BundleMigrator::new(&f.paths, |_: &Path| -> Result<()> {
            Err(BasecampError::CommandFailed {
                command: "npm install".to_string(),
                code: Some(1),
            })
        })
        .migrate()
        .unwrap_err();

        match err {
            BasecampError::MigrationError { stage, .. } => {
                assert_eq!(stage, "installing packages")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Manifest::load_optional(&f.paths.installed_manifest())
            .unwrap()
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn executables_are_marked() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture();
        migrator(&f.paths).migrate().unwrap();
        let mode = fs::metadata(f.paths.install_dir().join("frpc/frpc"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
