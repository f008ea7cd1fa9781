//! PID namespace isolation.
//!
//! Gives the child its own process ID space, where it runs as PID 1.

use hatch_common::error::{HatchError, Result};

/// Creates a new PID namespace for the children of the calling process.
///
/// The caller itself stays in its namespace; the next `fork(2)` child
/// sees itself as PID 1 inside the new one.
///
/// # Errors
///
/// Returns an error if the `unshare(CLONE_NEWPID)` syscall fails.
#[cfg(target_os = "linux")]
pub fn create_pid_namespace() -> Result<()> {
    use nix::sched::{CloneFlags, unshare};

    unshare(CloneFlags::CLONE_NEWPID).map_err(|e| HatchError::PermissionDenied {
        message: format!("PID namespace creation failed: {e}"),
    })?;
    tracing::debug!("PID namespace created");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: PID namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn create_pid_namespace() -> Result<()> {
    Err(HatchError::Config {
        message: "Linux required for PID namespaces".into(),
    })
}
