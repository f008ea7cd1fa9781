//! Root filesystem switching via `chroot(2)`.
//!
//! Only the process's view of `/` changes; the working directory is left
//! untouched, which callers rely on to reach the old tree afterwards.

use std::path::Path;

use hatch_common::error::{HatchError, Result};

/// Makes `new_root` the root directory of the calling process.
///
/// Requires `CAP_SYS_CHROOT`.
///
/// # Errors
///
/// Returns `HatchError::PermissionDenied` if `chroot(2)` fails.
#[cfg(unix)]
pub fn switch_root(new_root: &Path) -> Result<()> {
    nix::unistd::chroot(new_root).map_err(|e| HatchError::PermissionDenied {
        message: format!("chroot into {} failed: {e}", new_root.display()),
    })?;
    tracing::info!(new_root = %new_root.display(), "root switched");
    Ok(())
}

/// Stub for non-Unix platforms.
///
/// # Errors
///
/// Always returns an error: root switching requires a Unix host.
#[cfg(not(unix))]
pub fn switch_root(_new_root: &Path) -> Result<()> {
    Err(HatchError::Config {
        message: "Unix required for root switching".into(),
    })
}

/// Moves the working directory to the current root.
///
/// # Errors
///
/// Returns an error if `chdir(2)` fails.
#[cfg(unix)]
pub fn anchor_cwd_at_root() -> Result<()> {
    nix::unistd::chdir("/").map_err(|e| HatchError::io("/", std::io::Error::from(e)))
}

/// Stub for non-Unix platforms.
///
/// # Errors
///
/// Always returns an error: root switching requires a Unix host.
#[cfg(not(unix))]
pub fn anchor_cwd_at_root() -> Result<()> {
    Err(HatchError::Config {
        message: "Unix required for root switching".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_root_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        assert!(switch_root(&missing).is_err());
    }
}
