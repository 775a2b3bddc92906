//! Intent catalog and extraction models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dialogue::SlotValues;

/// How the engine treats an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// A task that gathers slots, asks for confirmation and runs an action
    #[default]
    Business,
    /// A side query answered without disturbing the active task
    Digression,
    /// Dialogue control, such as correcting a slot while confirming
    Control,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Digression => "digression",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type of a slot value, used when building oracle tool schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
}

impl SlotType {
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub value_type: SlotType,
    /// Optional slots are offered to the oracle but never asked for.
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

impl SlotDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, value_type: SlotType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value_type,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Immutable description of one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: IntentKind,
    /// Slots in declaration order; required ones are asked in this order.
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

impl IntentMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: IntentKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            slots: Vec::new(),
        }
    }

    pub fn with_slot(mut self, slot: SlotDefinition) -> Self {
        self.slots.push(slot);
        self
    }

    /// Names of the required slots, in declaration order
    pub fn required_slot_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.required)
            .map(|s| s.name.clone())
            .collect()
    }

    /// JSON schema of the intent's parameters, as sent to tool-calling models.
    pub fn parameters_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .slots
            .iter()
            .map(|slot| {
                (
                    slot.name.clone(),
                    serde_json::json!({
                        "type": slot.value_type.json_type(),
                        "description": slot.description,
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
        })
    }
}

/// Result of asking the oracle which intent an utterance expresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentExtraction {
    NoIntent,
    Matched {
        intent_name: String,
        arguments: SlotValues,
    },
}

impl IntentExtraction {
    pub fn matched(intent_name: impl Into<String>, arguments: SlotValues) -> Self {
        Self::Matched {
            intent_name: intent_name.into(),
            arguments,
        }
    }

    pub fn intent_name(&self) -> Option<&str> {
        match self {
            Self::NoIntent => None,
            Self::Matched { intent_name, .. } => Some(intent_name),
        }
    }
}
