#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the chatrelay server CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::Config;
use std::path::PathBuf;

/// Main CLI structure for the chatrelay server
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Room chat message relay", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the chatrelay CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// The port number to bind the server to, overriding the config file
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to a TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let resolved_config = Config::load_config(config, port)?;
            server::server::run(resolved_config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_serve_with_overrides() {
        let cli = Cli::parse_from(["chatrelay", "serve", "--port", "9000"]);
        let Commands::Serve { port, config } = cli.command;
        assert_eq!(port, Some(9000));
        assert!(config.is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
