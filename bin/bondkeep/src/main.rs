//! Bondkeep binary.

mod cli;
mod commands;
mod config;
mod logging;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::config::BondkeepConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_args)?;

    let config = BondkeepConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Config => commands::config::run(&config),
        Commands::Simulate(args) => commands::simulate::run(config, args).await,
    }
}
