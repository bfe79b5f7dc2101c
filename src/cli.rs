//! CLI definitions for CronRelay.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CronRelay CLI.
#[derive(Parser)]
#[command(name = "cronrelay")]
#[command(about = "Leader-elected distributed job scheduler")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and runner in foreground (default)
    Run {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,

        /// Acquire scheduler leadership at boot
        #[arg(long)]
        leader: bool,

        /// Do not register this process as a runner
        #[arg(long)]
        no_runner: bool,
    },

    /// Validate the configuration file and exit
    Validate,

    /// List the built-in job handlers
    Handlers,
}

/// Options for [`Commands::Run`] after defaults are applied.
#[derive(Debug, Default, Clone)]
pub(crate) struct RunOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub leader: bool,
    pub no_runner: bool,
}
