//! Parley CLI entry point.

use clap::Parser;

use parley::cli::commands::{chat, init, intents, send, state};
use parley::cli::{handle_error, Cli, Commands};
use parley::infrastructure::logging::{LogConfig, LoggerImpl};
use parley::infrastructure::setup::load_config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(&err, cli.json),
    };

    // Held for the lifetime of the process so file output is flushed
    let _logger = match LoggerImpl::init(&LogConfig::from_logging_config(&config.logging)) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await,
        Commands::Chat(args) => chat::execute(args, &config, cli.json).await,
        Commands::Send(args) => send::execute(args, &config, cli.json).await,
        Commands::State(args) => state::execute(args, &config, cli.json).await,
        Commands::Intents(args) => intents::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(&err, cli.json);
    }
}
