//! `hatch run`: run a command in a fresh jail.

use anyhow::Context;
use clap::{Args, ValueEnum};
use hatch_common::config::{LayerStaging, RuntimeConfig};
use hatch_common::types::ImageName;
use hatch_runtime::run::RunRequest;

/// Layer staging mode as accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingArg {
    /// Stream blobs straight into the image tree.
    Streamed,
    /// Stage each blob as files inside the jail first.
    OnDisk,
}

impl From<StagingArg> for LayerStaging {
    fn from(arg: StagingArg) -> Self {
        match arg {
            StagingArg::Streamed => Self::Streamed,
            StagingArg::OnDisk => Self::OnDisk,
        }
    }
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to pull and use as the root, e.g. `alpine` or `ubuntu:22.04`.
    #[arg(long)]
    pub image: Option<ImageName>,

    /// Keep the child in the host PID namespace.
    #[arg(long)]
    pub no_pid_namespace: bool,

    /// Build the jail but do not switch the root into it.
    #[arg(long)]
    pub no_root_switch: bool,

    /// How layer blobs are staged.
    #[arg(long, value_enum)]
    pub staging: Option<StagingArg>,

    /// Skip layer digest verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Command to run.
    pub command: String,

    /// Arguments passed to the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut RuntimeConfig) {
        if self.no_pid_namespace {
            config.pid_namespace = false;
        }
        if self.no_root_switch {
            config.jail.root_switch = false;
        }
        if let Some(staging) = self.staging {
            config.staging = staging.into();
        }
        if self.no_verify {
            config.verify_digests = false;
        }
    }
}

/// Executes the `run` command.
///
/// On completion the process exits with the child's exit code.
///
/// # Errors
///
/// Returns an error if the run fails before the child is launched.
pub fn execute(args: RunArgs, mut config: RuntimeConfig) -> anyhow::Result<()> {
    args.apply(&mut config);

    let request = RunRequest {
        command: args.command,
        args: args.args,
        image: args.image,
    };
    let report = hatch_runtime::run::run(&config, &request)
        .with_context(|| format!("failed to run {}", request.command))?;

    if let Some(e) = &report.cleanup_error {
        tracing::warn!(error = %e, "jail left behind");
    }
    std::process::exit(report.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Command};

    fn parse(argv: &[&str]) -> RunArgs {
        match Cli::try_parse_from(argv).expect("parse").command {
            Command::Run(args) => args,
            Command::Inspect(_) => panic!("expected run"),
        }
    }

    #[test]
    fn command_arguments_may_look_like_flags() {
        let args = parse(&["hatch", "run", "ls", "-la", "--color=never"]);
        assert_eq!(args.command, "ls");
        assert_eq!(args.args, vec!["-la", "--color=never"]);
    }

    #[test]
    fn flags_adjust_configuration() {
        let args = parse(&[
            "hatch",
            "run",
            "--image",
            "alpine:3.19",
            "--no-pid-namespace",
            "--no-root-switch",
            "--staging",
            "on-disk",
            "--no-verify",
            "sh",
        ]);
        assert_eq!(args.image.as_ref().map(ToString::to_string).as_deref(), Some("alpine:3.19"));

        let mut config = RuntimeConfig::default();
        args.apply(&mut config);
        assert!(!config.pid_namespace);
        assert!(!config.jail.root_switch);
        assert_eq!(config.staging, LayerStaging::OnDisk);
        assert!(!config.verify_digests);
    }

    #[test]
    fn defaults_leave_configuration_untouched() {
        let args = parse(&["hatch", "run", "true"]);
        let mut config = RuntimeConfig::default();
        args.apply(&mut config);
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn invalid_image_name_is_rejected() {
        assert!(Cli::try_parse_from(["hatch", "run", "--image", "Not Valid", "sh"]).is_err());
    }
}
