mod cli;
mod commands;
mod config;
mod history;
mod logging;

use clap::Parser;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    logging::initialize(cli.log.unwrap_or(config.log));

    match cli.command {
        Command::Collect(args) => commands::collect(&config, &args).await,
        Command::History { limit } => {
            commands::show_history(&config, limit);
            Ok(())
        }
        Command::Groups => {
            commands::show_groups(&config);
            Ok(())
        }
    }
}
