//! Private root directory for a single run.
//!
//! A jail is a freshly named temp directory seeded with the target
//! executable (at the same absolute path it has on the host), a copy of
//! `/etc`, and an empty `/dev`. Once seeded it becomes the process root.
//!
//! # Working directory outside the root
//!
//! [`Jail::enter`] moves the working directory to the host `/` and then
//! switches the root without changing directory again. The process therefore
//! keeps a working directory *outside* its own root, and teardown reaches the
//! jail through the host-relative path returned by [`Jail::teardown_path`].
//! A working directory outside the root is a known chroot escape vector, so
//! the launched child must never inherit it: the launcher sets the child's
//! working directory to the new `/` before exec.

use std::fs;
use std::path::{Component, Path, PathBuf};

use hatch_common::config::JailConfig;
use hatch_common::constants::{DIR_MODE, EXECUTABLE_MODE, JAIL_PREFIX};
use hatch_common::error::{HatchError, Result};

use crate::filesystem::{copy, root};

/// An ephemeral directory tree that serves as the process root.
#[derive(Debug)]
pub struct Jail {
    root: PathBuf,
    executable: PathBuf,
    entered: bool,
}

impl Jail {
    /// Creates and seeds a new jail for `executable`.
    ///
    /// If seeding fails the partially built directory is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if `executable` is not absolute, or if any directory
    /// or copy operation fails.
    pub fn create(config: &JailConfig, executable: &Path) -> Result<Self> {
        if !executable.is_absolute() {
            return Err(HatchError::Config {
                message: format!("executable path must be absolute: {}", executable.display()),
            });
        }

        let temp_root = config.resolved_temp_root();
        let staging = tempfile::Builder::new()
            .prefix(JAIL_PREFIX)
            .tempdir_in(&temp_root)
            .map_err(|e| HatchError::io(&temp_root, e))?;

        let root = fs::canonicalize(staging.path()).map_err(|e| HatchError::io(staging.path(), e))?;
        seed(&root, &config.etc_source, executable)?;

        let _ = staging.keep();
        tracing::info!(root = %root.display(), executable = %executable.display(), "jail built");

        Ok(Self {
            root,
            executable: executable.to_path_buf(),
            entered: false,
        })
    }

    /// Switches the process root into the jail.
    ///
    /// # Errors
    ///
    /// Returns an error if the jail was already entered or the root switch
    /// fails (typically for lack of privilege).
    pub fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(HatchError::Config {
                message: format!("jail {} already entered", self.root.display()),
            });
        }
        root::anchor_cwd_at_root()?;
        root::switch_root(&self.root)?;
        self.entered = true;
        Ok(())
    }

    /// Returns the absolute host path of the jail.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the executable path, valid both on the host and inside the jail.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns whether the process root is (or was) switched into the jail.
    #[must_use]
    pub const fn is_entered(&self) -> bool {
        self.entered
    }

    /// Returns where `relative` lives as seen by the current process.
    #[must_use]
    pub fn path_in_root(&self, relative: &Path) -> PathBuf {
        if self.entered {
            Path::new("/").join(relative)
        } else {
            self.root.join(relative)
        }
    }

    /// Returns the path that reaches the jail from the working directory.
    ///
    /// Before [`Jail::enter`] this is the absolute host path. Afterwards it is
    /// the host path relative to the host `/`, which stays the working
    /// directory for the rest of the run.
    #[must_use]
    pub fn teardown_path(&self) -> PathBuf {
        if self.entered {
            self.root
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect()
        } else {
            self.root.clone()
        }
    }

    /// Removes the jail tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn remove(self) -> Result<()> {
        let path = self.teardown_path();
        fs::remove_dir_all(&path).map_err(|e| HatchError::io(&path, e))?;
        tracing::info!(root = %self.root.display(), "jail removed");
        Ok(())
    }
}

fn seed(root: &Path, etc_source: &Path, executable: &Path) -> Result<()> {
    // Temp dirs are created 0700; the new root must be traversable.
    copy::set_mode(root, DIR_MODE)?;

    let relative: PathBuf = executable
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    copy::copy_file_with_mode(executable, &root.join(relative), EXECUTABLE_MODE)?;

    let _ = copy::copy_tree(etc_source, &root.join("etc"))?;

    let dev = root.join("dev");
    fs::create_dir_all(&dev).map_err(|e| HatchError::io(&dev, e))?;
    copy::set_mode(&dev, DIR_MODE)
}
