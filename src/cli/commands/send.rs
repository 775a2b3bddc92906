//! Implementation of the `parley send` command.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DialogueReply};
use crate::infrastructure::setup::build_engine;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// The user utterance
    pub message: String,

    /// Conversation the message belongs to
    #[arg(short = 'C', long)]
    pub conversation: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutput {
    pub conversation_id: String,
    #[serde(flatten)]
    pub reply: DialogueReply,
}

impl CommandOutput for SendOutput {
    fn to_human(&self) -> String {
        self.reply.reply.clone()
    }
}

/// Deliver one message. State survives between invocations only with the
/// sqlite store backend.
pub async fn execute(args: SendArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = build_engine(config).await?;
    let reply = engine
        .process_message(&args.message, &args.conversation)
        .await?;

    output(
        &SendOutput {
            conversation_id: args.conversation,
            reply,
        },
        json_mode,
    );
    Ok(())
}
