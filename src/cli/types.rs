//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::chat::ChatArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::intents::IntentsArgs;
use crate::cli::commands::send::SendArgs;
use crate::cli::commands::state::StateArgs;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Parley - multi-turn task dialogue orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .parley/config.yaml and .parley/local.yaml)
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Parley configuration and database
    Init(InitArgs),

    /// Start an interactive conversation
    Chat(ChatArgs),

    /// Send a single message to a conversation
    Send(SendArgs),

    /// Inspect or clear stored dialogue state
    State(StateArgs),

    /// List the intents the assistant understands
    Intents(IntentsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::state::StateCommands;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(["parley", "--json", "send", "buy AAPL", "-C", "c1"]);
        assert!(cli.json);
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.message, "buy AAPL");
                assert_eq!(args.conversation, "c1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_state_list() {
        let cli = Cli::parse_from(["parley", "state", "list", "--limit", "5"]);
        match cli.command {
            Commands::State(args) => {
                assert!(matches!(args.command, StateCommands::List { limit: 5 }));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
