//! Linux namespace management for child isolation.
//!
//! Only the PID namespace is used. It is treated as an optional platform
//! capability: hosts without it run the child in the shared namespace.

pub mod pid;

use hatch_common::error::Result;

/// PID namespace requested for the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidIsolation {
    /// The child becomes PID 1 of a fresh namespace and cannot see or
    /// signal host processes.
    Private,
    /// The child shares the launcher's PID namespace.
    Shared,
}

impl PidIsolation {
    /// Maps the `pid_namespace` configuration flag, degrading to `Shared`
    /// on platforms without PID namespaces.
    #[must_use]
    pub fn from_config(requested: bool) -> Self {
        if !requested {
            return Self::Shared;
        }
        if Self::supported() {
            Self::Private
        } else {
            tracing::warn!("PID namespaces are not supported on this platform; running without");
            Self::Shared
        }
    }

    /// Returns whether the host platform supports PID namespaces.
    #[must_use]
    pub const fn supported() -> bool {
        cfg!(target_os = "linux")
    }

    /// Prepares the launcher so that its next child gets this isolation.
    ///
    /// Must run after every helper thread has exited, immediately before
    /// the child is spawned.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be created.
    pub fn apply(self) -> Result<()> {
        match self {
            Self::Private => pid::create_pid_namespace(),
            Self::Shared => Ok(()),
        }
    }
}
