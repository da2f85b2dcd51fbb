#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    dead_code
)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use marina_common::config::Config;
use marina_common::logging::init_logging;

mod chat;
mod doctor;
mod provider;

/// Marina assistant CLI.
#[derive(Parser, Debug)]
#[command(name = "marina")]
#[command(version = "0.1.0")]
#[command(about = "Terminal chat and diagnostics for the Marina assistant.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Talk to the assistant in the terminal
    Chat,
    /// Verify the Anthropic credential and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_init()?;
    config.apply_env_overrides();

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    match cli.command {
        Commands::Chat => chat::run(&config).await,
        Commands::Doctor => doctor::run(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }
}
