//! Blocking filesystem moves used by the migrator.
//!
//! Every function returns only after the operation has finished on disk.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

/// Move a directory, replacing whatever is at `to`.
///
/// Falls back to copy-then-delete when a rename is not possible (for
/// example across filesystems).
pub fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    remove_path(to)?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                "rename {} -> {} failed ({}), copying",
                from.display(),
                to.display(),
                e
            );
            copy_dir_all(from, to)?;
            fs::remove_dir_all(from)
        }
    }
}

/// Recursively copy `from` into `to`, overwriting files.
pub fn copy_dir_all(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let link = fs::read_link(from)?;
    remove_path(to)?;
    std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Remove a file or directory tree. Missing paths are fine.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Mark a file `0o755`. Returns `false` when the file does not exist.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    if !path.is_file() {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn set_executable(path: &Path) -> io::Result<bool> {
    Ok(path.is_file())
}
