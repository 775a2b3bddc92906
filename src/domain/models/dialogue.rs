//! Dialogue state domain model.
//!
//! A `DialogueState` exists for a conversation only while a task is in
//! progress. Absence of a record means the conversation is idle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Slot name to collected value.
pub type SlotValues = BTreeMap<String, Value>;

/// Status of an active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueStatus {
    /// Required slots are still being collected
    GatheringInfo,
    /// All slots collected, waiting for the user to confirm
    ConfirmationPending,
}

impl DialogueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatheringInfo => "gathering_info",
            Self::ConfirmationPending => "confirmation_pending",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gathering_info" | "gathering" => Some(Self::GatheringInfo),
            "confirmation_pending" | "confirming" => Some(Self::ConfirmationPending),
            _ => None,
        }
    }
}

impl fmt::Display for DialogueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a parent task suspended while a precondition sub-task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginatingIntent {
    pub intent_name: String,
    pub arguments: SlotValues,
    /// Further ancestor suspended when this parent was itself a sub-task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<OriginatingIntent>>,
}

impl OriginatingIntent {
    pub fn new(intent_name: impl Into<String>, arguments: SlotValues) -> Self {
        Self {
            intent_name: intent_name.into(),
            arguments,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<OriginatingIntent>) -> Self {
        self.parent = parent.map(Box::new);
        self
    }

    /// Number of suspended tasks in this chain, including `self`.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Intent names from this snapshot up to the outermost ancestor.
    pub fn chain(&self) -> Vec<&str> {
        let mut names = vec![self.intent_name.as_str()];
        let mut current = self.parent.as_deref();
        while let Some(node) = current {
            names.push(node.intent_name.as_str());
            current = node.parent.as_deref();
        }
        names
    }

    pub fn contains(&self, intent_name: &str) -> bool {
        self.chain().contains(&intent_name)
    }

    /// Detach the ancestor chain, leaving this snapshot without a parent.
    pub fn take_parent(&mut self) -> Option<OriginatingIntent> {
        self.parent.take().map(|p| *p)
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-conversation state of the task currently being worked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    pub conversation_id: String,
    pub intent_name: String,
    /// Slots needed to execute `intent_name`, in the order they are asked.
    pub required_slots: Vec<String>,
    pub collected_slots: SlotValues,
    pub status: DialogueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_intent: Option<OriginatingIntent>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogueState {
    /// Start gathering slots for `intent_name`, seeded with any values
    /// already extracted. Null seeds are ignored.
    pub fn new(
        conversation_id: impl Into<String>,
        intent_name: impl Into<String>,
        required_slots: Vec<String>,
        seed: &SlotValues,
    ) -> Self {
        let now = Utc::now();
        let mut state = Self {
            conversation_id: conversation_id.into(),
            intent_name: intent_name.into(),
            required_slots,
            collected_slots: SlotValues::new(),
            status: DialogueStatus::GatheringInfo,
            originating_intent: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.merge_slots(seed);
        state
    }

    pub fn with_originating_intent(mut self, originating: Option<OriginatingIntent>) -> Self {
        self.originating_intent = originating;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn is_slot_filled(&self, slot: &str) -> bool {
        self.collected_slots
            .get(slot)
            .is_some_and(|value| !value.is_null())
    }

    /// Required slots without a non-null value, in declaration order.
    pub fn missing_slots(&self) -> Vec<&str> {
        self.required_slots
            .iter()
            .map(String::as_str)
            .filter(|slot| !self.is_slot_filled(slot))
            .collect()
    }

    pub fn next_missing_slot(&self) -> Option<&str> {
        self.required_slots
            .iter()
            .map(String::as_str)
            .find(|slot| !self.is_slot_filled(slot))
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing_slot().is_none()
    }

    /// Merge newly extracted values. New values overwrite old ones for the
    /// same key; nulls never overwrite. Returns the number of values applied.
    pub fn merge_slots(&mut self, values: &SlotValues) -> usize {
        let mut applied = 0;
        for (name, value) in values {
            if value.is_null() {
                continue;
            }
            self.collected_slots.insert(name.clone(), value.clone());
            applied += 1;
        }
        if applied > 0 {
            self.updated_at = Utc::now();
        }
        applied
    }

    /// Overwrite a single slot as an explicit correction.
    pub fn set_slot(&mut self, name: impl Into<String>, value: Value) -> DomainResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Slot name cannot be empty".to_string(),
            ));
        }
        if value.is_null() {
            return Err(DomainError::ValidationFailed(format!(
                "Slot '{name}' cannot be set to null"
            )));
        }
        self.collected_slots.insert(name, value);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `ConfirmationPending`. Fails while any required slot is missing.
    pub fn mark_confirmation_pending(&mut self) -> DomainResult<()> {
        let missing = self.missing_slots();
        if !missing.is_empty() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: DialogueStatus::ConfirmationPending.to_string(),
                reason: format!("missing slots: {}", missing.join(", ")),
            });
        }
        self.status = DialogueStatus::ConfirmationPending;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append turns, keeping at most `max_messages` of the most recent.
    pub fn append_history(&mut self, messages: impl IntoIterator<Item = ChatMessage>, max_messages: usize) {
        self.history.extend(messages);
        if self.history.len() > max_messages {
            let excess = self.history.len() - max_messages;
            self.history.drain(..excess);
        }
    }

    /// Arguments passed to the action handler on dispatch.
    pub fn arguments(&self) -> SlotValues {
        self.collected_slots.clone()
    }
}

/// Context handed to the oracle for a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueContext {
    pub conversation_id: String,
    /// Prior turns followed by the latest user message.
    pub history: Vec<ChatMessage>,
}

impl DialogueContext {
    pub fn new(conversation_id: impl Into<String>, prior: &[ChatMessage], user_message: &str) -> Self {
        let mut history = prior.to_vec();
        history.push(ChatMessage::user(user_message));
        Self {
            conversation_id: conversation_id.into(),
            history,
        }
    }

    /// The utterance being processed this turn.
    pub fn latest_user_message(&self) -> &str {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Reply returned for each processed utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueReply {
    pub reply: String,
    pub is_task_finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slots(pairs: &[(&str, Value)]) -> SlotValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn purchase_state(seed: &SlotValues) -> DialogueState {
        DialogueState::new(
            "conv-1",
            "stock_purchase",
            vec!["ticker".to_string(), "quantity".to_string()],
            seed,
        )
    }

    #[test]
    fn test_new_state_ignores_null_seed() {
        let state = purchase_state(&slots(&[("ticker", Value::Null), ("quantity", json!(5))]));
        assert_eq!(state.status, DialogueStatus::GatheringInfo);
        assert!(!state.is_slot_filled("ticker"));
        assert_eq!(state.missing_slots(), vec!["ticker"]);
    }

    #[test]
    fn test_missing_slots_follow_declaration_order() {
        let state = purchase_state(&SlotValues::new());
        assert_eq!(state.missing_slots(), vec!["ticker", "quantity"]);
        assert_eq!(state.next_missing_slot(), Some("ticker"));
    }

    #[test]
    fn test_merge_never_regresses_with_null() {
        let mut state = purchase_state(&slots(&[("ticker", json!("AAPL"))]));
        let applied = state.merge_slots(&slots(&[("ticker", Value::Null), ("quantity", json!(100))]));
        assert_eq!(applied, 1);
        assert_eq!(state.collected_slots["ticker"], json!("AAPL"));
        assert!(state.is_complete());
    }

    #[test]
    fn test_merge_overwrites_with_new_value() {
        let mut state = purchase_state(&slots(&[("ticker", json!("AAPL"))]));
        state.merge_slots(&slots(&[("ticker", json!("MSFT"))]));
        assert_eq!(state.collected_slots["ticker"], json!("MSFT"));
    }

    #[test]
    fn test_confirmation_requires_all_slots() {
        let mut state = purchase_state(&slots(&[("ticker", json!("AAPL"))]));
        let err = state.mark_confirmation_pending().unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(state.status, DialogueStatus::GatheringInfo);

        state.merge_slots(&slots(&[("quantity", json!(100))]));
        state.mark_confirmation_pending().unwrap();
        assert_eq!(state.status, DialogueStatus::ConfirmationPending);
    }

    #[test]
    fn test_set_slot_rejects_null() {
        let mut state = purchase_state(&SlotValues::new());
        assert!(state.set_slot("ticker", Value::Null).is_err());
        assert!(state.set_slot("", json!("x")).is_err());
        state.set_slot("ticker", json!("TSLA")).unwrap();
        assert_eq!(state.collected_slots["ticker"], json!("TSLA"));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = purchase_state(&SlotValues::new());
        for i in 0..5 {
            state.append_history([ChatMessage::user(format!("m{i}"))], 3);
        }
        let contents: Vec<_> = state.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_originating_chain() {
        let root = OriginatingIntent::new("stock_purchase", SlotValues::new());
        let child = OriginatingIntent::new("open_account", SlotValues::new()).with_parent(Some(root));
        assert_eq!(child.depth(), 2);
        assert_eq!(child.chain(), vec!["open_account", "stock_purchase"]);
        assert!(child.contains("stock_purchase"));
        assert!(!child.contains("check_weather"));
    }

    #[test]
    fn test_state_serialization_shape() {
        let state = purchase_state(&slots(&[("ticker", json!("AAPL"))])).with_originating_intent(Some(
            OriginatingIntent::new("parent", slots(&[("a", json!(1))])),
        ));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], json!("gathering_info"));
        assert_eq!(value["originating_intent"]["intent_name"], json!("parent"));
        assert!(value["originating_intent"].get("parent").is_none());

        let back: DialogueState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_context_latest_message() {
        let prior = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let ctx = DialogueContext::new("c", &prior, "buy AAPL");
        assert_eq!(ctx.latest_user_message(), "buy AAPL");
        assert_eq!(ctx.history.len(), 3);
    }

    #[test]
    fn test_reply_serializes_camel_case() {
        let value = serde_json::to_value(DialogueReply {
            reply: "done".to_string(),
            is_task_finished: true,
        }).unwrap();
        assert_eq!(value, json!({"reply": "done", "isTaskFinished": true}));
    }
}
