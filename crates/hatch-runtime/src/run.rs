//! The end-to-end run pipeline.
//!
//! Resolves the command, builds the sandbox, optionally materializes an
//! image, runs the child, and tears everything down. Errors before the child
//! is attempted are returned as-is and leave any jail behind; from the moment
//! the child is attempted teardown always runs.

use std::path::PathBuf;

use hatch_common::config::RuntimeConfig;
use hatch_common::error::{HatchError, Result};
use hatch_common::types::ImageName;

use crate::launcher::LaunchSpec;
use crate::sandbox::{Sandbox, TeardownReport};

/// A single `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Program name or path, looked up on `PATH` when not absolute.
    pub command: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Image to pull and run inside, if any.
    pub image: Option<ImageName>,
}

/// Runs `request` in a fresh sandbox.
///
/// # Errors
///
/// Returns an error if the command cannot be resolved, or if building the
/// jail or materializing the image fails. Child failures are reported
/// through [`TeardownReport::exit_code`] instead.
pub fn run(config: &RuntimeConfig, request: &RunRequest) -> Result<TeardownReport> {
    let program = resolve_command(&request.command)?;
    tracing::info!(program = %program.display(), args = ?request.args, image = ?request.image, "run requested");

    let mut sandbox = Sandbox::build(config, &program)?;
    if let Some(image) = &request.image {
        let _ = sandbox.materialize(image)?;
    }

    let spec = LaunchSpec {
        program,
        args: request.args.clone(),
        working_dir: sandbox.effective_root(),
    };
    let _ = sandbox.exec(&spec)?;
    sandbox.teardown()
}

/// Resolves `command` to an absolute path on the host.
///
/// # Errors
///
/// Returns `HatchError::NotFound` if no executable matches.
pub fn resolve_command(command: &str) -> Result<PathBuf> {
    which::which(command).map_err(|e| HatchError::NotFound {
        kind: "command",
        id: format!("{command} ({e})"),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn resolves_commands_on_path() {
        let path = resolve_command("sh").expect("sh on PATH");
        assert!(path.is_absolute());
    }

    #[test]
    fn absolute_paths_resolve_to_themselves() {
        assert_eq!(
            resolve_command("/bin/sh").expect("resolve"),
            PathBuf::from("/bin/sh")
        );
    }

    #[test]
    fn unknown_command_is_not_found() {
        let err = resolve_command("hatch-no-such-command").unwrap_err();
        assert!(matches!(err, HatchError::NotFound { kind: "command", .. }));
    }
}
