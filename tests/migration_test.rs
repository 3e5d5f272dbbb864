//! Integration tests for bundle migration through the public API.

use basecamp::bundle::{pack, BundleMigrator, Manifest, MigrationPlan, MigrationStage};
use basecamp::config::LauncherPaths;
use basecamp::BasecampError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const USER_DIRS: [&str; 3] = ["agents", "filehub", "rpa_data_dir"];

struct Layout {
    _temp: TempDir,
    paths: LauncherPaths,
    payload: PathBuf,
}

fn layout() -> Layout {
    let temp = TempDir::new().unwrap();
    let paths = LauncherPaths::new(temp.path().join("data"), temp.path().join("bundle"));
    let payload = temp.path().join("payload");
    fs::create_dir_all(payload.join("agents/builtin")).unwrap();
    fs::create_dir_all(payload.join("lib")).unwrap();
    fs::write(payload.join("start.js"), "v1").unwrap();
    fs::write(payload.join("lib/util.js"), "util v1").unwrap();
    fs::write(payload.join("agents/builtin/agent.json"), "seed").unwrap();
    Layout {
        _temp: temp,
        paths,
        payload,
    }
}

/// Pack the payload and pin the bundle to `build`.
fn ship(layout: &Layout, build: u64) {
    pack(&layout.payload, &layout.paths.bundle_dir, None).unwrap();
    let manifest_path = layout.paths.bundle_manifest();
    let mut manifest = Manifest::load(&manifest_path).unwrap();
    manifest.build = build;
    manifest.save(&manifest_path).unwrap();
}

fn migrate(paths: &LauncherPaths) -> basecamp::Result<MigrationPlan> {
    BundleMigrator::new(paths, |_: &Path| -> basecamp::Result<()> { Ok(()) })
        .user_dirs(&USER_DIRS.map(String::from))
        .migrate()
        .map(|outcome| outcome.plan)
}

fn installed_build(paths: &LauncherPaths) -> u64 {
    Manifest::load(&paths.installed_manifest()).unwrap().build
}

/// Relative path to contents for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out
}

fn user_data(paths: &LauncherPaths) -> BTreeMap<PathBuf, Vec<u8>> {
    USER_DIRS
        .iter()
        .map(|dir| snapshot(&paths.install_dir().join(dir)))
        .enumerate()
        .flat_map(|(i, files)| {
            files
                .into_iter()
                .map(move |(rel, bytes)| (Path::new(USER_DIRS[i]).join(rel), bytes))
        })
        .collect()
}

fn seed_user_data(paths: &LauncherPaths) {
    let install = paths.install_dir();
    fs::write(install.join("agents/builtin/agent.json"), "edited by user").unwrap();
    fs::create_dir_all(install.join("agents/custom/deep")).unwrap();
    fs::write(install.join("agents/custom/deep/prompt.md"), "# mine").unwrap();
    fs::write(install.join("filehub/report.bin"), [0u8, 159, 146, 150]).unwrap();
    fs::write(install.join("rpa_data_dir/session.json"), "{}").unwrap();
}

#[test]
fn same_build_is_a_no_op() {
    let l = layout();
    ship(&l, 3);
    migrate(&l.paths).unwrap();
    seed_user_data(&l.paths);
    let before = snapshot(&l.paths.install_dir());

    let plan = migrate(&l.paths).unwrap();

    assert_eq!(plan, MigrationPlan::UpToDate { build: 3 });
    assert_eq!(snapshot(&l.paths.install_dir()), before);
}

#[test]
fn upgrade_preserves_user_data_byte_for_byte() {
    let l = layout();
    ship(&l, 2);
    migrate(&l.paths).unwrap();
    seed_user_data(&l.paths);
    let before = user_data(&l.paths);

    fs::write(l.payload.join("start.js"), "v5").unwrap();
    fs::remove_file(l.payload.join("lib/util.js")).unwrap();
    ship(&l, 5);
    let plan = migrate(&l.paths).unwrap();

    assert_eq!(plan, MigrationPlan::Upgrade { from: 2, to: 5 });
    assert_eq!(installed_build(&l.paths), 5);
    assert_eq!(user_data(&l.paths), before);
    let install = l.paths.install_dir();
    assert_eq!(fs::read_to_string(install.join("start.js")).unwrap(), "v5");
    assert!(!install.join("lib/util.js").exists());
    assert!(!l.paths.backup_dir().exists());
}

#[test]
fn interruption_before_commit_is_recovered_on_retry() {
    let interrupted = [
        MigrationStage::RemoveInstall,
        MigrationStage::Extract,
        MigrationStage::Restore,
        MigrationStage::Permissions,
        MigrationStage::PackageManifest,
        MigrationStage::PackageInstall,
        MigrationStage::Commit,
    ];

    for stop_at in interrupted {
        let l = layout();
        ship(&l, 2);
        migrate(&l.paths).unwrap();
        seed_user_data(&l.paths);
        let before = user_data(&l.paths);
        ship(&l, 5);

        let err = BundleMigrator::new(&l.paths, |_: &Path| -> basecamp::Result<()> { Ok(()) })
            .user_dirs(&USER_DIRS.map(String::from))
            .on_stage(|stage| {
                if stage == stop_at {
                    Err(BasecampError::migration(stage.to_string(), "interrupted"))
                } else {
                    Ok(())
                }
            })
            .migrate()
            .unwrap_err();

        assert!(
            matches!(err, BasecampError::MigrationError { .. }),
            "stopping at {:?}",
            stop_at
        );
        assert_eq!(installed_build(&l.paths), 2, "stopping at {:?}", stop_at);

        let plan = migrate(&l.paths).unwrap();
        assert_eq!(plan, MigrationPlan::Upgrade { from: 2, to: 5 });
        assert_eq!(installed_build(&l.paths), 5);
        assert_eq!(user_data(&l.paths), before, "stopping at {:?}", stop_at);
    }
}

#[test]
fn failed_cleanup_does_not_undo_the_commit() {
    let l = layout();
    ship(&l, 2);
    migrate(&l.paths).unwrap();
    ship(&l, 5);

    let outcome = BundleMigrator::new(&l.paths, |_: &Path| -> basecamp::Result<()> { Ok(()) })
        .user_dirs(&USER_DIRS.map(String::from))
        .on_stage(|stage| match stage {
            MigrationStage::Cleanup => Err(BasecampError::migration(stage.to_string(), "busy")),
            _ => Ok(()),
        })
        .migrate()
        .unwrap();

    assert!(outcome.performed);
    assert_eq!(installed_build(&l.paths), 5);
}

#[test]
fn package_install_failure_leaves_previous_build() {
    let l = layout();
    ship(&l, 2);
    migrate(&l.paths).unwrap();
    fs::write(l.paths.bundle_dir.join("package.json"), r#"{"name":"svc"}"#).unwrap();
    ship(&l, 5);

    let err = BundleMigrator::new(&l.paths, |dir: &Path| -> basecamp::Result<()> {
        assert!(dir.join("package.json").is_file());
        Err(BasecampError::CommandFailed {
            command: "npm install".to_string(),
            code: Some(1),
        })
    })
    .user_dirs(&USER_DIRS.map(String::from))
    .migrate()
    .unwrap_err();

    assert!(err.to_string().contains("installing packages"));
    assert_eq!(installed_build(&l.paths), 2);
}
