//! Dialogue state CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::cli::output::{create_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, DialogueState};
use crate::infrastructure::setup::build_engine;

#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommands,
}

#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show the active task of a conversation
    Show {
        /// Conversation ID
        conversation: String,
    },
    /// Abandon the active task of a conversation
    Clear {
        /// Conversation ID
        conversation: String,
    },
    /// List conversations with an active task
    List {
        /// Maximum number of conversations to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct StateSummary {
    pub conversation_id: String,
    pub intent_name: String,
    pub status: String,
    pub missing_slots: Vec<String>,
    pub suspended: Vec<String>,
    pub updated_at: String,
}

impl From<&DialogueState> for StateSummary {
    fn from(state: &DialogueState) -> Self {
        Self {
            conversation_id: state.conversation_id.clone(),
            intent_name: state.intent_name.clone(),
            status: state.status.as_str().to_string(),
            missing_slots: state.missing_slots().into_iter().map(String::from).collect(),
            suspended: state
                .originating_intent
                .as_ref()
                .map(|origin| origin.chain().into_iter().map(String::from).collect())
                .unwrap_or_default(),
            updated_at: state.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StateShowOutput {
    pub conversation_id: String,
    pub state: Option<DialogueState>,
}

impl CommandOutput for StateShowOutput {
    fn to_human(&self) -> String {
        let Some(state) = &self.state else {
            return format!("Conversation {} is idle.", self.conversation_id);
        };

        let mut lines = vec![
            format!("Conversation: {}", state.conversation_id),
            format!("Intent:       {}", state.intent_name),
            format!("Status:       {}", state.status),
        ];
        lines.push("Slots:".to_string());
        for slot in &state.required_slots {
            let value = state
                .collected_slots
                .get(slot)
                .map_or_else(|| "(missing)".to_string(), render_value);
            lines.push(format!("  {slot}: {value}"));
        }
        if let Some(origin) = &state.originating_intent {
            lines.push(format!("Suspended:    {}", origin.chain().join(" <- ")));
        }
        lines.push(format!("History:      {} message(s)", state.history.len()));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StateClearOutput {
    pub conversation_id: String,
    pub cleared: bool,
}

impl CommandOutput for StateClearOutput {
    fn to_human(&self) -> String {
        if self.cleared {
            format!("Abandoned the active task of {}.", self.conversation_id)
        } else {
            format!("Conversation {} had no active task.", self.conversation_id)
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StateListOutput {
    pub states: Vec<StateSummary>,
    pub total: usize,
}

impl CommandOutput for StateListOutput {
    fn to_human(&self) -> String {
        if self.states.is_empty() {
            return "No active tasks.".to_string();
        }

        let mut table = create_table(&["Conversation", "Intent", "Status", "Missing", "Updated"]);
        for state in &self.states {
            table.add_row(vec![
                truncate(&state.conversation_id, 24),
                state.intent_name.clone(),
                state.status.clone(),
                state.missing_slots.join(", "),
                state.updated_at.clone(),
            ]);
        }
        format!("Found {} active task(s):\n{table}", self.total)
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn execute(args: StateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = build_engine(config).await?;

    match args.command {
        StateCommands::Show { conversation } => {
            let state = engine.state(&conversation).await?;
            output(
                &StateShowOutput {
                    conversation_id: conversation,
                    state,
                },
                json_mode,
            );
        }
        StateCommands::Clear { conversation } => {
            let cleared = engine.abandon(&conversation).await?;
            output(
                &StateClearOutput {
                    conversation_id: conversation,
                    cleared,
                },
                json_mode,
            );
        }
        StateCommands::List { limit } => {
            let states = engine.active_states(limit).await?;
            let summaries: Vec<StateSummary> = states.iter().map(StateSummary::from).collect();
            output(
                &StateListOutput {
                    total: summaries.len(),
                    states: summaries,
                },
                json_mode,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OriginatingIntent, SlotValues};
    use serde_json::json;

    fn sample_state() -> DialogueState {
        let seed: SlotValues = [("ticker".to_string(), json!("AAPL"))].into_iter().collect();
        DialogueState::new(
            "c1",
            "open_account",
            vec!["education".to_string(), "occupation".to_string()],
            &seed,
        )
        .with_originating_intent(Some(OriginatingIntent::new("stock_purchase", seed.clone())))
    }

    #[test]
    fn test_summary_lists_missing_and_suspended() {
        let summary = StateSummary::from(&sample_state());
        assert_eq!(summary.missing_slots, vec!["education", "occupation"]);
        assert_eq!(summary.suspended, vec!["stock_purchase"]);
        assert_eq!(summary.status, "gathering_info");
    }

    #[test]
    fn test_show_output_for_idle_conversation() {
        let out = StateShowOutput {
            conversation_id: "c9".to_string(),
            state: None,
        };
        assert_eq!(out.to_human(), "Conversation c9 is idle.");
    }

    #[test]
    fn test_show_output_marks_missing_slots() {
        let out = StateShowOutput {
            conversation_id: "c1".to_string(),
            state: Some(sample_state()),
        };
        let human = out.to_human();
        assert!(human.contains("education: (missing)"));
        assert!(human.contains("Suspended:    stock_purchase"));
    }
}
