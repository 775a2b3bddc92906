//! Implementation of the `parley intents` command.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{create_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, IntentMetadata};
use crate::infrastructure::setup::build_registry;

#[derive(Args, Debug)]
pub struct IntentsArgs {
    /// Only show intents of this kind (business, digression, control)
    #[arg(short, long)]
    pub kind: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct IntentsOutput {
    pub intents: Vec<IntentMetadata>,
}

impl CommandOutput for IntentsOutput {
    fn to_human(&self) -> String {
        if self.intents.is_empty() {
            return "No intents registered.".to_string();
        }

        let mut table = create_table(&["Intent", "Kind", "Slots", "Description"]);
        for intent in &self.intents {
            let slots = intent
                .slots
                .iter()
                .map(|slot| {
                    if slot.required {
                        slot.name.clone()
                    } else {
                        format!("{}?", slot.name)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                intent.name.clone(),
                intent.kind.as_str().to_string(),
                slots,
                truncate(&intent.description, 60),
            ]);
        }
        table.to_string()
    }
}

pub async fn execute(args: IntentsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let registry = build_registry(config).await?;
    let intents = registry
        .all()
        .iter()
        .filter(|intent| {
            args.kind
                .as_deref()
                .is_none_or(|kind| intent.kind.as_str().eq_ignore_ascii_case(kind))
        })
        .cloned()
        .collect();

    output(&IntentsOutput { intents }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::IntentRegistry;

    #[test]
    fn test_optional_slots_are_marked() {
        let registry = IntentRegistry::builtin().unwrap();
        let out = IntentsOutput {
            intents: registry.all().to_vec(),
        };
        let human = out.to_human();
        assert!(human.contains("stock_purchase"));
        assert!(human.contains("city?"));
    }
}
