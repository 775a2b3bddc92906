//! Interactive conversation loop.

use anyhow::{Context, Result};
use clap::Args;
use console::{style, Term};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::cli::commands::state::StateShowOutput;
use crate::cli::output::{create_spinner, CommandOutput};
use crate::domain::models::{Config, DialogueReply};
use crate::infrastructure::setup::build_engine;
use crate::services::DialogueEngine;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Resume an existing conversation (a new ID is generated otherwise)
    #[arg(short = 'C', long)]
    pub conversation: Option<String>,
}

/// Lines starting with `/` are handled locally instead of sent
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Quit,
    State,
    Reset,
    Help,
    Unknown(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Option<Self> {
        let command = line.strip_prefix('/')?;
        Some(match command.trim() {
            "quit" | "exit" | "q" => Self::Quit,
            "state" => Self::State,
            "reset" => Self::Reset,
            "help" | "?" => Self::Help,
            other => Self::Unknown(other.to_string()),
        })
    }
}

const HELP: &str = "/state  show the active task\n/reset  abandon the active task\n/quit   leave the conversation";

pub async fn execute(args: ChatArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = build_engine(config).await?;
    let conversation_id = args
        .conversation
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let interactive = !json_mode && Term::stdout().is_term();

    if !json_mode {
        println!(
            "{} conversation {} ({} oracle). Type /help for commands.",
            style("Parley").cyan().bold(),
            style(&conversation_id).dim(),
            engine.oracle_name()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("{} ", style("you>").green().bold());
            std::io::Write::flush(&mut std::io::stdout()).context("Failed to flush stdout")?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = ReplCommand::parse(line) {
            match command {
                ReplCommand::Quit => break,
                ReplCommand::State => {
                    let state = engine.state(&conversation_id).await?;
                    let out = StateShowOutput {
                        conversation_id: conversation_id.clone(),
                        state,
                    };
                    print_local(&out, json_mode);
                }
                ReplCommand::Reset => {
                    let cleared = engine.abandon(&conversation_id).await?;
                    println!(
                        "{}",
                        if cleared { "Active task abandoned." } else { "Nothing to abandon." }
                    );
                }
                ReplCommand::Help => println!("{HELP}"),
                ReplCommand::Unknown(other) => println!("Unknown command /{other}. Type /help."),
            }
            continue;
        }

        let reply = send(&engine, line, &conversation_id, interactive).await?;
        if json_mode {
            println!("{}", serde_json::to_string(&reply).unwrap_or_default());
        } else {
            let marker = if reply.is_task_finished {
                style("bot>").cyan().bold()
            } else {
                style("bot>").yellow().bold()
            };
            println!("{marker} {}", reply.reply);
        }
    }

    Ok(())
}

async fn send(
    engine: &DialogueEngine,
    message: &str,
    conversation_id: &str,
    interactive: bool,
) -> Result<DialogueReply> {
    let spinner = interactive.then(|| create_spinner("thinking..."));
    let result = engine.process_message(message, conversation_id).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    Ok(result?)
}

fn print_local<T: CommandOutput>(out: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string(&out.to_json()).unwrap_or_default());
    } else {
        println!("{}", out.to_human());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parsing() {
        assert_eq!(ReplCommand::parse("/quit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/exit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/state"), Some(ReplCommand::State));
        assert_eq!(ReplCommand::parse("/reset "), Some(ReplCommand::Reset));
        assert_eq!(
            ReplCommand::parse("/dance"),
            Some(ReplCommand::Unknown("dance".to_string()))
        );
        assert_eq!(ReplCommand::parse("buy 100 shares"), None);
    }
}
