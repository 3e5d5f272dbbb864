//! Gzip tarball extraction and packing.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use super::manifest::Manifest;

/// Directory names never packed into a bundle.
pub const SKIPPED_DIRS: [&str; 3] = ["node_modules", "temp", "tmp"];

/// Extract `archive` into `dest`, creating it. Returns the number of entries.
///
/// Absolute paths and `..` components are rejected before anything is
/// written for that entry. File modes stored in the archive are kept.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);

    fs::create_dir_all(dest)?;
    let mut count = 0;

    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        check_entry_path(&path)?;

        if !entry.unpack_in(dest)? {
            bail!("archive entry escapes destination: {}", path.display());
        }
        count += 1;
    }

    tracing::debug!("extracted {} entries into {}", count, dest.display());
    Ok(count)
}

fn check_entry_path(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("unsafe archive entry path: {}", path.display()),
        }
    }
    Ok(())
}

/// Result of packing a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub archive: PathBuf,
    pub files: usize,
    pub build: u64,
}

/// Pack `src` into `<out_dir>/bundle.tar.gz` and bump the build number in
/// `<out_dir>/bundle.json`.
///
/// Directories in [`SKIPPED_DIRS`] and empty files are left out. When
/// `package_manifest` is given it is copied next to the archive.
pub fn pack(src: &Path, out_dir: &Path, package_manifest: Option<&Path>) -> Result<PackSummary> {
    if !src.is_dir() {
        bail!("{} is not a directory", src.display());
    }
    fs::create_dir_all(out_dir)?;

    let archive = out_dir.join("bundle.tar.gz");
    let temp = out_dir.join("bundle.tar.gz.tmp");

    let mut files = Vec::new();
    collect_files(src, Path::new(""), &mut files)?;

    let encoder = GzEncoder::new(File::create(&temp)?, Compression::best());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    for rel in &files {
        builder
            .append_path_with_name(src.join(rel), rel)
            .with_context(|| format!("archive {}", rel.display()))?;
    }
    builder.into_inner()?.finish()?;
    fs::rename(&temp, &archive)?;

    if let Some(manifest) = package_manifest {
        let name = manifest
            .file_name()
            .ok_or_else(|| anyhow!("invalid package manifest path {}", manifest.display()))?;
        fs::copy(manifest, out_dir.join(name))
            .with_context(|| format!("copy {}", manifest.display()))?;
    }

    let manifest_path = out_dir.join("bundle.json");
    let mut manifest = Manifest::load_optional(&manifest_path)?.unwrap_or_default();
    manifest.build += 1;
    manifest.save(&manifest_path)?;

    tracing::info!(
        "packed {} files into {} (build {})",
        files.len(),
        archive.display(),
        manifest.build
    );

    Ok(PackSummary {
        archive,
        files: files.len(),
        build: manifest.build,
    })
}

fn collect_files(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(root.join(rel))?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let child = rel.join(&name);
        let meta = fs::symlink_metadata(entry.path())?;

        if meta.is_dir() {
            if SKIPPED_DIRS.iter().any(|skip| name == *skip) {
                continue;
            }
            collect_files(root, &child, out)?;
        } else if meta.is_file() && meta.len() == 0 {
            continue;
        } else {
            out.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(root: &Path) {
        fs::create_dir_all(root.join("agents/demo")).unwrap();
        fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        fs::create_dir_all(root.join("lib/tmp")).unwrap();
        fs::write(root.join("start.js"), "console.log('READY:')").unwrap();
        fs::write(root.join("agents/demo/agent.json"), "{}").unwrap();
        fs::write(root.join("node_modules/left-pad/index.js"), "x").unwrap();
        fs::write(root.join("lib/tmp/cache"), "x").unwrap();
        fs::write(root.join("empty.txt"), "").unwrap();
    }

    #[test]
    fn pack_then_extract() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("bundle");
        tree(&src);

        let summary = pack(&src, &out, None).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.build, 1);

        let dest = temp.path().join("server");
        extract(&summary.archive, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("start.js")).unwrap(),
            "console.log('READY:')"
        );
        assert!(dest.join("agents/demo/agent.json").exists());
        assert!(!dest.join("node_modules").exists());
        assert!(!dest.join("lib/tmp").exists());
        assert!(!dest.join("empty.txt").exists());
    }

    #[test]
    fn pack_bumps_existing_build_and_copies_package_manifest() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("bundle");
        tree(&src);
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("bundle.json"), r#"{"build": 41, "node": "22"}"#).unwrap();
        let package = temp.path().join("package.json");
        fs::write(&package, r#"{"name":"svc"}"#).unwrap();

        let summary = pack(&src, &out, Some(&package)).unwrap();

        assert_eq!(summary.build, 42);
        let manifest = Manifest::load(&out.join("bundle.json")).unwrap();
        assert_eq!(manifest.runtime_version("node"), Some("22"));
        assert!(out.join("package.json").exists());
        assert!(!out.join("bundle.tar.gz.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn pack_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("frpc")).unwrap();
        let bin = src.join("frpc/frpc");
        fs::write(&bin, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

        let summary = pack(&src, &temp.path().join("out"), None).unwrap();
        let dest = temp.path().join("dest");
        extract(&summary.archive, &dest).unwrap();

        let mode = fs::metadata(dest.join("frpc/frpc")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn rejects_parent_components() {
        assert!(check_entry_path(Path::new("agents/a.json")).is_ok());
        assert!(check_entry_path(Path::new("./start.js")).is_ok());
        assert!(check_entry_path(Path::new("../etc/passwd")).is_err());
        assert!(check_entry_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn missing_archive_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = extract(&temp.path().join("nope.tar.gz"), temp.path()).unwrap_err();
        assert!(err.to_string().contains("nope.tar.gz"));
    }

    #[test]
    fn pack_rejects_missing_source() {
        let temp = TempDir::new().unwrap();
        assert!(pack(&temp.path().join("missing"), temp.path(), None).is_err());
    }
}
