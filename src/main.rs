//! CronRelay - leader-elected distributed job scheduler.
//!
//! Main entry point for the CronRelay CLI and server.

mod cli;
mod handlers;
mod server;

use clap::Parser;

use cronrelay_config::{ConfigLoader, ConfigValidator};
use cronrelay_core::HandlerRegistry;

use crate::cli::{Cli, Commands, RunOptions};
use crate::handlers::register_builtin;
use crate::server::{init_tracing, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::Validate) => {
            let result = ConfigValidator::validate(&config);
            for warning in &result.warnings {
                println!("warning: {}: {}", warning.path, warning.message);
            }
            for issue in &result.errors {
                println!("error: {}: {}", issue.path, issue.message);
            }
            result.into_result()?;
            println!("{}: ok", cli.config.display());
            Ok(())
        }
        Some(Commands::Handlers) => {
            let registry = HandlerRegistry::new();
            register_builtin(&registry)?;
            let mut keys = registry.list_keys();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
            Ok(())
        }
        command => {
            let options = match command {
                Some(Commands::Run {
                    host,
                    port,
                    leader,
                    no_runner,
                }) => RunOptions {
                    host,
                    port,
                    leader,
                    no_runner,
                },
                _ => RunOptions::default(),
            };

            init_tracing(&config.logging)?;
            for warning in ConfigValidator::validate(&config).into_result()? {
                tracing::warn!("Config {}: {}", warning.path, warning.message);
            }
            run_server(config, options).await
        }
    }
}
