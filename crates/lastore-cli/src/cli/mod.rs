//! CLI for the lastore job engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lastore_core::config::{self, LastoreConfig};
use std::path::{Path, PathBuf};

use commands::{run_config, run_lanes, run_replay};

/// Top-level CLI for the lastore job engine.
#[derive(Debug, Parser)]
#[command(name = "lastore")]
#[command(about = "lastore: package job engine harness", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Replay a scripted driver session through the engine and print every notification.
    Replay {
        /// Path to the JSON replay script.
        script: PathBuf,
        /// Ignore `delay_ms` in the script and feed samples back to back.
        #[arg(long)]
        no_delay: bool,
    },

    /// Show the configuration file path and the effective configuration.
    Config,

    /// List configured job lanes.
    Lanes,
}

fn load_config(path: Option<&Path>) -> Result<LastoreConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Replay { script, no_delay } => run_replay(&cfg, &script, no_delay).await?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
            CliCommand::Lanes => run_lanes(&cfg),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
