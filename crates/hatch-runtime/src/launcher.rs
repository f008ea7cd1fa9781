//! Child process launch and reaping.
//!
//! The child inherits the launcher's standard streams and is waited on
//! synchronously. Every way a launch can end, including failing to start,
//! is folded into a [`ChildOutcome`] with a shell-style exit code.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use hatch_common::constants::{
    EXIT_COMMAND_NOT_EXECUTABLE, EXIT_COMMAND_NOT_FOUND, EXIT_SIGNAL_BASE,
};
use hatch_core::namespace::PidIsolation;

/// What to execute and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program path, resolved against the current root.
    pub program: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<String>,
    /// Working directory of the child, resolved against the current root.
    pub working_dir: PathBuf,
}

/// How a child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOutcome {
    /// The child exited normally with this code.
    Exited(i32),
    /// The child was terminated by this signal number.
    Signaled(i32),
    /// The child never started.
    LaunchFailed {
        /// Program that could not be started.
        program: PathBuf,
        /// Kind of the underlying error.
        kind: io::ErrorKind,
        /// Error description.
        message: String,
    },
}

impl ChildOutcome {
    /// Exit code the launcher should finish with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => EXIT_SIGNAL_BASE + *signal,
            Self::LaunchFailed { kind, .. } => {
                if matches!(kind, io::ErrorKind::NotFound) {
                    EXIT_COMMAND_NOT_FOUND
                } else {
                    EXIT_COMMAND_NOT_EXECUTABLE
                }
            }
        }
    }

    fn launch_failed(program: PathBuf, error: &io::Error) -> Self {
        tracing::warn!(program = %program.display(), error = %error, "failed to launch child");
        Self::LaunchFailed {
            program,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug)]
enum ChildState {
    Running(Child),
    Failed(ChildOutcome),
}

/// A launched (or failed) child process.
#[derive(Debug)]
pub struct ChildHandle {
    program: PathBuf,
    state: ChildState,
}

impl ChildHandle {
    /// Starts `spec` with the given PID isolation.
    ///
    /// Never fails outright: a namespace or spawn error is kept and returned
    /// by [`ChildHandle::wait`].
    pub fn spawn(spec: &LaunchSpec, isolation: PidIsolation) -> Self {
        let program = spec.program.clone();

        if let Err(e) = isolation.apply() {
            let error = io::Error::other(e.to_string());
            return Self {
                state: ChildState::Failed(ChildOutcome::launch_failed(program.clone(), &error)),
                program,
            };
        }

        let spawned = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();

        let state = match spawned {
            Ok(child) => {
                tracing::info!(
                    program = %program.display(),
                    pid = child.id(),
                    isolation = ?isolation,
                    "child started"
                );
                ChildState::Running(child)
            }
            Err(e) => ChildState::Failed(ChildOutcome::launch_failed(program.clone(), &e)),
        };
        Self { program, state }
    }

    /// Host PID of the child, if it started.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            ChildState::Running(child) => Some(child.id()),
            ChildState::Failed(_) => None,
        }
    }

    /// Blocks until the child terminates.
    pub fn wait(self) -> ChildOutcome {
        let mut child = match self.state {
            ChildState::Running(child) => child,
            ChildState::Failed(outcome) => return outcome,
        };
        match child.wait() {
            Ok(status) => {
                let outcome = classify(status);
                tracing::info!(program = %self.program.display(), outcome = ?outcome, "child exited");
                outcome
            }
            Err(e) => ChildOutcome::launch_failed(self.program, &e),
        }
    }
}

#[cfg(unix)]
fn classify(status: ExitStatus) -> ChildOutcome {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        return ChildOutcome::Exited(code);
    }
    let signal = status.signal().unwrap_or_default();
    tracing::debug!(signal, name = ?nix::sys::signal::Signal::try_from(signal).ok(), "child killed by signal");
    ChildOutcome::Signaled(signal)
}

#[cfg(not(unix))]
fn classify(status: ExitStatus) -> ChildOutcome {
    ChildOutcome::Exited(status.code().unwrap_or(1))
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;

    use super::*;

    fn shell(script: &str) -> LaunchSpec {
        LaunchSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            working_dir: PathBuf::from("/"),
        }
    }

    fn run(spec: &LaunchSpec) -> ChildOutcome {
        ChildHandle::spawn(spec, PidIsolation::Shared).wait()
    }

    #[test]
    fn exit_code_is_propagated() {
        let outcome = run(&shell("exit 7"));
        assert_eq!(outcome, ChildOutcome::Exited(7));
        assert_eq!(outcome.exit_code(), 7);
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(run(&shell("true")).exit_code(), 0);
    }

    #[test]
    fn signal_maps_to_128_plus_number() {
        let outcome = run(&shell("kill -TERM $$"));
        assert_eq!(outcome, ChildOutcome::Signaled(15));
        assert_eq!(outcome.exit_code(), 143);
    }

    #[test]
    fn working_directory_is_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker"), "").expect("write");
        let mut spec = shell("test -f marker");
        spec.working_dir = dir.path().to_path_buf();
        assert_eq!(run(&spec).exit_code(), 0);
    }

    #[test]
    fn missing_program_is_127() {
        let spec = LaunchSpec {
            program: PathBuf::from("/nonexistent/hatch-test-binary"),
            args: Vec::new(),
            working_dir: PathBuf::from("/"),
        };
        let handle = ChildHandle::spawn(&spec, PidIsolation::Shared);
        assert!(handle.pid().is_none());
        let outcome = handle.wait();
        assert!(matches!(outcome, ChildOutcome::LaunchFailed { .. }));
        assert_eq!(outcome.exit_code(), 127);
    }

    #[test]
    fn non_executable_program_is_126() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("script.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").expect("write");
        hatch_core::filesystem::copy::set_mode(&script, 0o644).expect("chmod");

        let spec = LaunchSpec {
            program: script,
            args: Vec::new(),
            working_dir: Path::new("/").to_path_buf(),
        };
        assert_eq!(run(&spec).exit_code(), 126);
    }
}
