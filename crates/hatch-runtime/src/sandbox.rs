//! The per-run sandbox and its lifecycle.
//!
//! A [`Sandbox`] owns the jail, tracks which root the process currently sees,
//! and only allows the steps of
//! `Initializing → JailBuilt → [ImageMaterialized] → ChildRunning → ChildExited → CleanedUp`
//! in that order. Anything else is rejected with `HatchError::InvalidState`
//! before any side effect.

use std::path::{Path, PathBuf};

use hatch_common::config::RuntimeConfig;
use hatch_common::error::{HatchError, Result};
use hatch_common::types::{ImageName, LifecycleState};
use hatch_core::filesystem::root;
use hatch_core::jail::Jail;
use hatch_core::namespace::PidIsolation;
use hatch_image::materialize::{MaterializedImage, Materializer};

use crate::launcher::{ChildHandle, ChildOutcome, LaunchSpec};

/// Result of tearing a sandbox down.
#[derive(Debug)]
pub struct TeardownReport {
    /// Exit code to finish the launcher with.
    pub exit_code: i32,
    /// Set when the jail could not be removed. Never changes `exit_code`.
    pub cleanup_error: Option<HatchError>,
}

/// One isolated run: a jail, an optional image, and a single child.
#[derive(Debug)]
pub struct Sandbox {
    config: RuntimeConfig,
    isolation: PidIsolation,
    state: LifecycleState,
    jail: Option<Jail>,
    image: Option<MaterializedImage>,
    outcome: Option<ChildOutcome>,
}

impl Sandbox {
    /// Builds the jail for `executable` and, unless disabled, switches the
    /// process root into it.
    ///
    /// # Errors
    ///
    /// Returns an error if the jail cannot be created or entered. A jail that
    /// was created but could not be entered is removed again.
    pub fn build(config: &RuntimeConfig, executable: &Path) -> Result<Self> {
        let mut jail = Jail::create(&config.jail, executable)?;

        if config.jail.root_switch {
            if let Err(e) = jail.enter() {
                if let Err(cleanup) = jail.remove() {
                    tracing::warn!(error = %cleanup, "failed to remove unentered jail");
                }
                return Err(e);
            }
        } else {
            tracing::warn!(root = %jail.root().display(), "root switch disabled; jail is a plain directory");
        }

        Ok(Self {
            config: config.clone(),
            isolation: PidIsolation::from_config(config.pid_namespace),
            state: LifecycleState::JailBuilt,
            jail: Some(jail),
            image: None,
            outcome: None,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Absolute host path of the jail, while it exists.
    #[must_use]
    pub fn jail_root(&self) -> Option<&Path> {
        self.jail.as_ref().map(Jail::root)
    }

    /// Materialized image, if one was pulled.
    #[must_use]
    pub const fn image(&self) -> Option<&MaterializedImage> {
        self.image.as_ref()
    }

    /// Outcome of the child, once it has been attempted.
    #[must_use]
    pub const fn outcome(&self) -> Option<&ChildOutcome> {
        self.outcome.as_ref()
    }

    /// Directory the child should start in, as seen by this process.
    ///
    /// With the root switched this is always `/`. Otherwise it is the host
    /// path of the image tree, or of the jail when no image was pulled.
    #[must_use]
    pub fn effective_root(&self) -> PathBuf {
        if self.config.jail.root_switch {
            return PathBuf::from("/");
        }
        if let Some(image) = &self.image {
            return image.root.clone();
        }
        self.jail
            .as_ref()
            .map_or_else(|| PathBuf::from("/"), |j| j.root().to_path_buf())
    }

    /// Pulls `image` into the jail and, with root switching enabled, makes
    /// the image tree the process root.
    ///
    /// The registry client is dropped before this returns, so no helper
    /// threads outlive the pull.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::InvalidState` outside `JailBuilt`, and any pull,
    /// archive, digest, or root-switch error. On failure the jail is left in
    /// place.
    pub fn materialize(&mut self, image: &ImageName) -> Result<&MaterializedImage> {
        self.check(LifecycleState::ImageMaterialized)?;
        let jail = self.jail.as_ref().ok_or(HatchError::InvalidState {
            from: self.state,
            to: LifecycleState::ImageMaterialized,
        })?;

        let pulled = {
            let materializer = Materializer::new(&self.config)?;
            materializer.materialize(image, &jail.path_in_root(Path::new("")))?
        };

        if jail.is_entered() {
            root::switch_root(&pulled.root)?;
        }

        self.state = LifecycleState::ImageMaterialized;
        Ok(self.image.insert(pulled))
    }

    /// Launches the child and waits for it.
    ///
    /// Launch failures are not errors: they are recorded as
    /// [`ChildOutcome::LaunchFailed`] and the sandbox still moves on to
    /// `ChildExited`.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::InvalidState` unless the jail is built and no
    /// child has run yet.
    pub fn exec(&mut self, spec: &LaunchSpec) -> Result<&ChildOutcome> {
        self.check(LifecycleState::ChildRunning)?;
        self.state = LifecycleState::ChildRunning;

        let outcome = ChildHandle::spawn(spec, self.isolation).wait();
        tracing::info!(exit_code = outcome.exit_code(), "child finished");

        self.state = LifecycleState::ChildExited;
        Ok(self.outcome.insert(outcome))
    }

    /// Removes the jail and reports the exit code to finish with.
    ///
    /// A removal failure is logged and recorded in the report; it never
    /// changes the exit code.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::InvalidState` unless the child has been attempted
    /// and teardown has not run yet.
    pub fn teardown(&mut self) -> Result<TeardownReport> {
        self.check(LifecycleState::CleanedUp)?;
        let exit_code = self.outcome.as_ref().map_or(1, ChildOutcome::exit_code);

        let cleanup_error = self.jail.take().and_then(|jail| {
            jail.remove()
                .inspect_err(|e| tracing::warn!(error = %e, "failed to remove jail"))
                .err()
        });

        self.state = LifecycleState::CleanedUp;
        tracing::info!(exit_code, clean = cleanup_error.is_none(), "sandbox torn down");
        Ok(TeardownReport {
            exit_code,
            cleanup_error,
        })
    }

    fn check(&self, next: LifecycleState) -> Result<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(HatchError::InvalidState {
                from: self.state,
                to: next,
            })
        }
    }
}
