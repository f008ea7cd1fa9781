//! Recursive copying used to seed the jail.

use std::fs;
use std::path::Path;

use hatch_common::error::{HatchError, Result};

/// Counts of entries written by [`copy_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    /// Directories created.
    pub directories: usize,
    /// Regular files copied.
    pub files: usize,
    /// Symbolic links recreated.
    pub symlinks: usize,
    /// Sockets, FIFOs and device nodes left out.
    pub skipped: usize,
}

/// Copies the tree rooted at `src` into `dst`, creating `dst` if needed.
///
/// Directories and regular files keep their permission bits; symbolic links
/// are recreated verbatim rather than followed. Special files are skipped.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopySummary> {
    let mut summary = CopySummary::default();
    copy_dir(src, dst, &mut summary)?;
    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        files = summary.files,
        directories = summary.directories,
        symlinks = summary.symlinks,
        skipped = summary.skipped,
        "tree copied"
    );
    Ok(summary)
}

fn copy_dir(src: &Path, dst: &Path, summary: &mut CopySummary) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|e| HatchError::io(src, e))?;
    fs::create_dir_all(dst).map_err(|e| HatchError::io(dst, e))?;
    fs::set_permissions(dst, metadata.permissions()).map_err(|e| HatchError::io(dst, e))?;
    summary.directories += 1;

    for entry in fs::read_dir(src).map_err(|e| HatchError::io(src, e))? {
        let entry = entry.map_err(|e| HatchError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| HatchError::io(&from, e))?;

        if file_type.is_dir() {
            copy_dir(&from, &to, summary)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
            summary.symlinks += 1;
        } else if file_type.is_file() {
            let _ = fs::copy(&from, &to).map_err(|e| HatchError::io(&from, e))?;
            summary.files += 1;
        } else {
            tracing::debug!(path = %from.display(), "skipping special file");
            summary.skipped += 1;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| HatchError::io(from, e))?;
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to).map_err(|e| HatchError::io(to, e))?;
    }
    std::os::unix::fs::symlink(&target, to).map_err(|e| HatchError::io(to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, _to: &Path) -> Result<()> {
    tracing::debug!(path = %from.display(), "skipping symlink on non-Unix host");
    Ok(())
}

/// Copies a single file and sets `mode` on the copy, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns an error if the source is unreadable or the destination cannot
/// be written.
pub fn copy_file_with_mode(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| HatchError::io(parent, e))?;
    }
    let _ = fs::copy(src, dst).map_err(|e| HatchError::io(src, e))?;
    set_mode(dst, mode)
}

/// Applies Unix permission bits to `path`.
///
/// # Errors
///
/// Returns an error if `chmod(2)` fails.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| HatchError::io(path, e))
}

/// No-op on non-Unix platforms.
///
/// # Errors
///
/// Never fails.
#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
