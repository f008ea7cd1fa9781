//! CLI command definitions and dispatch.

pub mod inspect;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hatch_common::config::RuntimeConfig;

/// Hatch: run a command in a throwaway root.
#[derive(Parser, Debug)]
#[command(name = "hatch", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file.
    #[arg(long, global = true, env = "HATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry base URL.
    #[arg(long, global = true, env = "HATCH_REGISTRY")]
    pub registry: Option<String>,

    /// Token service base URL.
    #[arg(long, global = true, env = "HATCH_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Directory new jails are created under.
    #[arg(long, global = true, env = "HATCH_TEMP_ROOT")]
    pub temp_root: Option<PathBuf>,

    /// Directory copied to `/etc` inside the jail.
    #[arg(long, global = true, env = "HATCH_ETC_SOURCE")]
    pub etc_source: Option<PathBuf>,
}

impl Cli {
    /// Resolves the runtime configuration: defaults, then the config file,
    /// then global flags and their environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RuntimeConfig::default(),
        };

        if let Some(url) = &self.registry {
            config.registry.url.clone_from(url);
        }
        if let Some(url) = &self.auth_url {
            config.registry.auth_url.clone_from(url);
        }
        if let Some(dir) = &self.temp_root {
            config.jail.temp_root = Some(dir.clone());
        }
        if let Some(dir) = &self.etc_source {
            config.jail.etc_source.clone_from(dir);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in a fresh jail, optionally on top of an image.
    Run(run::RunArgs),
    /// Show the layers of an image without pulling them.
    Inspect(inspect::InspectArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.runtime_config()?;
    match cli.command {
        Command::Run(args) => run::execute(args, config),
        Command::Inspect(args) => inspect::execute(&args, &config),
    }
}
