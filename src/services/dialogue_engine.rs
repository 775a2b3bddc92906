//! Dialogue orchestration engine.
//!
//! Decides, turn by turn, whether to answer a digression, start a task, keep
//! collecting slots, ask for confirmation, run the action, resolve an unmet
//! precondition as a sub-task, or fall back to free chat.
//!
//! Each turn is computed as a [`TurnOutcome`] first and written to the state
//! store once at the end, so a turn either leaves the store untouched, clears
//! it, or writes exactly one new state.

use serde_json::Value;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionResult, ChatMessage, DialogueConfig, DialogueContext, DialogueReply, DialogueState,
    DialogueStatus, IntentExtraction, IntentMetadata, OriginatingIntent, SlotValues,
};
use crate::domain::ports::{DialogueStateStore, Oracle};
use crate::services::action_dispatcher::ActionDispatcher;
use crate::services::intent_registry::IntentRegistry;
use crate::services::prompt_templates::{fallback_summary, FREE_CHAT_FALLBACK};

const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on actions run within one turn (resumed parents included).
const MAX_DISPATCHES_PER_TURN: usize = 16;

/// Store write performed at the end of a turn.
#[derive(Debug)]
enum StateChange {
    /// Leave the stored state untouched
    Keep,
    Clear,
    Save(Box<DialogueState>),
    /// Delete the old record, then save a freshly created state
    Replace(Box<DialogueState>),
}

#[derive(Debug)]
struct TurnOutcome {
    reply: String,
    finished: bool,
    change: StateChange,
}

impl TurnOutcome {
    fn new(reply: impl Into<String>, finished: bool, change: StateChange) -> Self {
        Self {
            reply: reply.into(),
            finished,
            change,
        }
    }
}

/// Inputs shared by every step of one turn.
struct Turn<'a> {
    conversation_id: &'a str,
    message: &'a str,
    /// History stored before this turn, without the current utterance
    prior: Vec<ChatMessage>,
    context: DialogueContext,
}

pub struct DialogueEngine {
    registry: Arc<IntentRegistry>,
    store: Arc<dyn DialogueStateStore>,
    oracle: Arc<dyn Oracle>,
    dispatcher: Arc<ActionDispatcher>,
    config: DialogueConfig,
    oracle_timeout: Duration,
}

impl DialogueEngine {
    pub fn new(
        registry: Arc<IntentRegistry>,
        store: Arc<dyn DialogueStateStore>,
        oracle: Arc<dyn Oracle>,
        dispatcher: Arc<ActionDispatcher>,
        config: DialogueConfig,
    ) -> Self {
        Self {
            registry,
            store,
            oracle,
            dispatcher,
            config,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    /// Process one user utterance and produce the assistant reply.
    ///
    /// # Errors
    /// Only state store failures are returned. Oracle and action failures
    /// are folded into the reply.
    #[instrument(skip(self, user_message))]
    pub async fn process_message(
        &self,
        user_message: &str,
        conversation_id: &str,
    ) -> DomainResult<DialogueReply> {
        let current = self.store.get(conversation_id).await?;
        let prior = current
            .as_ref()
            .map(|state| state.history.clone())
            .unwrap_or_default();
        let turn = Turn {
            conversation_id,
            message: user_message,
            context: DialogueContext::new(conversation_id, &prior, user_message),
            prior,
        };

        let outcome = if let Some(outcome) = self.handle_digression(&turn, current.as_ref()).await {
            outcome
        } else {
            match current {
                Some(state) if self.is_cancel(user_message) => {
                    info!(intent = %state.intent_name, "Task abandoned by user");
                    TurnOutcome::new(
                        format!("Okay, I've cancelled {}.", state.intent_name),
                        true,
                        StateChange::Clear,
                    )
                }
                Some(state) => match state.status {
                    DialogueStatus::GatheringInfo => self.handle_gathering(&turn, state).await,
                    DialogueStatus::ConfirmationPending => {
                        self.handle_confirmation(&turn, state).await
                    }
                },
                None => self.handle_idle(&turn).await,
            }
        };

        self.apply(&turn, outcome).await
    }

    /// Drop any active task for the conversation. Returns whether one existed.
    ///
    /// # Errors
    /// Returns error if the state store fails
    #[instrument(skip(self))]
    pub async fn abandon(&self, conversation_id: &str) -> DomainResult<bool> {
        let existed = self.store.get(conversation_id).await?.is_some();
        self.store.clear(conversation_id).await?;
        if existed {
            info!("Active task abandoned");
        }
        Ok(existed)
    }

    /// Current state of a conversation, `None` when idle.
    ///
    /// # Errors
    /// Returns error if the state store fails
    pub async fn state(&self, conversation_id: &str) -> DomainResult<Option<DialogueState>> {
        self.store.get(conversation_id).await
    }

    /// Most recently updated active tasks across conversations.
    ///
    /// # Errors
    /// Returns error if the state store fails
    pub async fn active_states(&self, limit: usize) -> DomainResult<Vec<DialogueState>> {
        self.store.list(limit).await
    }

    /// Answer a side query without touching the stored task.
    async fn handle_digression(
        &self,
        turn: &Turn<'_>,
        current: Option<&DialogueState>,
    ) -> Option<TurnOutcome> {
        let allowed = self.registry.resolve(&self.registry.digression_intents());
        let IntentExtraction::Matched {
            intent_name,
            arguments,
        } = self.extract(turn, &allowed).await
        else {
            return None;
        };

        debug!(intent = %intent_name, "Handling digression");
        let result = self
            .dispatcher
            .dispatch(turn.conversation_id, &intent_name, &arguments)
            .await;
        let summary = self.summarize(turn, &result).await;

        Some(match current {
            Some(state) => TurnOutcome::new(
                format!("{summary}\n\n{}", self.pending_prompt(state)),
                false,
                StateChange::Keep,
            ),
            None => TurnOutcome::new(summary, true, StateChange::Keep),
        })
    }

    async fn handle_idle(&self, turn: &Turn<'_>) -> TurnOutcome {
        let allowed = self.registry.resolve(&self.registry.business_intents());
        match self.extract(turn, &allowed).await {
            IntentExtraction::NoIntent => {
                let reply = self.free_chat(turn).await;
                TurnOutcome::new(reply, true, StateChange::Keep)
            }
            IntentExtraction::Matched {
                intent_name,
                arguments,
            } => {
                info!(intent = %intent_name, "Starting task");
                let required = self.registry.required_slots(&intent_name);
                if required.is_empty() {
                    return self.run_action(turn, intent_name, arguments, None).await;
                }
                let state = DialogueState::new(turn.conversation_id, intent_name, required, &arguments)
                    .with_history(turn.prior.clone());
                self.advance(state, None)
            }
        }
    }

    async fn handle_gathering(&self, turn: &Turn<'_>, mut state: DialogueState) -> TurnOutcome {
        let allowed = self.registry.resolve(&[state.intent_name.as_str()]);
        if let IntentExtraction::Matched { arguments, .. } = self.extract(turn, &allowed).await {
            let applied = state.merge_slots(&arguments);
            debug!(intent = %state.intent_name, applied, "Merged extracted slots");
        }
        self.advance(state, None)
    }

    async fn handle_confirmation(&self, turn: &Turn<'_>, mut state: DialogueState) -> TurnOutcome {
        if let Some(control) = self.registry.control_intent(&self.config.modify_slot_intent) {
            let extraction = self.extract(turn, slice::from_ref(control)).await;
            if let IntentExtraction::Matched { arguments, .. } = extraction {
                if let Some((slot, value)) = parse_slot_modification(&arguments) {
                    if state.set_slot(slot.clone(), value).is_ok() {
                        info!(intent = %state.intent_name, slot = %slot, "Slot corrected");
                        return self.advance(state, Some(format!("I've updated {slot}.")));
                    }
                }
                debug!("Ignoring malformed slot modification");
            }
        }

        if self.is_affirmative(turn.message) {
            info!(intent = %state.intent_name, "Task confirmed");
            let arguments = state.arguments();
            let originating = state.originating_intent.take();
            return self
                .run_action(turn, state.intent_name, arguments, originating)
                .await;
        }

        TurnOutcome::new(
            "Which detail would you like to change? You can tell me the field and its new value, \
             or reply \"yes\" to confirm.",
            false,
            StateChange::Keep,
        )
    }

    /// Ask for the next missing slot, or move to confirmation once complete.
    fn advance(&self, mut state: DialogueState, preface: Option<String>) -> TurnOutcome {
        let prompt = if state.mark_confirmation_pending().is_ok() {
            confirmation_message(&state)
        } else {
            self.next_question(&state)
        };
        let reply = match preface {
            Some(preface) => format!("{preface} {prompt}"),
            None => prompt,
        };
        TurnOutcome::new(reply, false, StateChange::Save(Box::new(state)))
    }

    /// Run an action and follow its outcome: resume suspended parents on
    /// success, open a sub-task on an unmet precondition, stop on error.
    async fn run_action(
        &self,
        turn: &Turn<'_>,
        mut intent_name: String,
        mut arguments: SlotValues,
        mut originating: Option<OriginatingIntent>,
    ) -> TurnOutcome {
        let mut replies: Vec<String> = Vec::new();
        let mut dispatches = 0;

        loop {
            dispatches += 1;
            let result = if dispatches > MAX_DISPATCHES_PER_TURN {
                warn!(intent = %intent_name, "Too many chained actions in one turn");
                ActionResult::error("Too many chained actions in one turn")
            } else {
                self.dispatcher
                    .dispatch(turn.conversation_id, &intent_name, &arguments)
                    .await
            };

            match result {
                ActionResult::PreconditionFailed { missing_dependency } => {
                    let snapshot = OriginatingIntent::new(intent_name.clone(), arguments)
                        .with_parent(originating.take());

                    if let Err(err) = self.check_dependency(&snapshot, &missing_dependency) {
                        warn!(intent = %intent_name, dependency = %missing_dependency, error = %err, "Rejected precondition");
                        let result = ActionResult::error(err.to_string());
                        replies.push(self.summarize(turn, &result).await);
                        return TurnOutcome::new(replies.join("\n\n"), true, StateChange::Clear);
                    }

                    info!(intent = %intent_name, dependency = %missing_dependency, "Precondition failed, starting sub-task");
                    let notice = format!(
                        "Before I can complete {intent_name}, {missing_dependency} needs to be done first."
                    );
                    let required = self.registry.required_slots(&missing_dependency);
                    if required.is_empty() {
                        replies.push(notice);
                        intent_name = missing_dependency;
                        arguments = SlotValues::new();
                        originating = Some(snapshot);
                        continue;
                    }

                    let state = DialogueState::new(
                        turn.conversation_id,
                        missing_dependency,
                        required,
                        &SlotValues::new(),
                    )
                    .with_originating_intent(Some(snapshot))
                    .with_history(turn.prior.clone());
                    replies.push(format!("{notice} {}", self.next_question(&state)));
                    return TurnOutcome::new(
                        replies.join("\n\n"),
                        false,
                        StateChange::Replace(Box::new(state)),
                    );
                }
                ActionResult::Success { .. } => {
                    replies.push(self.summarize(turn, &result).await);

                    let Some(mut parent) = originating.take() else {
                        return TurnOutcome::new(replies.join("\n\n"), true, StateChange::Clear);
                    };
                    let ancestors = parent.take_parent();
                    info!(intent = %parent.intent_name, "Resuming suspended task");

                    if !self.config.redispatch_resumed_intent {
                        let required = self.registry.required_slots(&parent.intent_name);
                        if !required.is_empty() {
                            let state = DialogueState::new(
                                turn.conversation_id,
                                parent.intent_name,
                                required,
                                &parent.arguments,
                            )
                            .with_originating_intent(ancestors)
                            .with_history(turn.prior.clone());
                            let resumed = self.advance(state, None);
                            replies.push(resumed.reply);
                            let change = match resumed.change {
                                StateChange::Save(state) => StateChange::Replace(state),
                                other => other,
                            };
                            return TurnOutcome::new(replies.join("\n\n"), false, change);
                        }
                    }

                    intent_name = parent.intent_name;
                    arguments = parent.arguments;
                    originating = ancestors;
                }
                ActionResult::Error { .. } => {
                    replies.push(self.summarize(turn, &result).await);
                    return TurnOutcome::new(replies.join("\n\n"), true, StateChange::Clear);
                }
            }
        }
    }

    /// Reject dependencies that would loop back onto a suspended task or nest
    /// deeper than allowed.
    fn check_dependency(&self, snapshot: &OriginatingIntent, dependency: &str) -> DomainResult<()> {
        if snapshot.contains(dependency) {
            let mut chain: Vec<String> = snapshot.chain().into_iter().rev().map(String::from).collect();
            chain.push(dependency.to_string());
            return Err(DomainError::DependencyCycle(chain));
        }
        if !self.registry.contains(dependency) {
            return Err(DomainError::IntentNotFound(dependency.to_string()));
        }
        if snapshot.depth() > self.config.max_dependency_depth {
            return Err(DomainError::ValidationFailed(format!(
                "Precondition chain exceeds the maximum depth of {}",
                self.config.max_dependency_depth
            )));
        }
        Ok(())
    }

    /// Write the outcome to the store and build the reply.
    async fn apply(&self, turn: &Turn<'_>, outcome: TurnOutcome) -> DomainResult<DialogueReply> {
        let exchange = [
            ChatMessage::user(turn.message),
            ChatMessage::assistant(outcome.reply.as_str()),
        ];

        match outcome.change {
            StateChange::Keep => {}
            StateChange::Clear => self.store.clear(turn.conversation_id).await?,
            StateChange::Save(mut state) => {
                state.append_history(exchange, self.config.max_history_messages);
                self.store.save(turn.conversation_id, &state).await?;
                debug!(intent = %state.intent_name, status = %state.status, "State saved");
            }
            StateChange::Replace(mut state) => {
                state.append_history(exchange, self.config.max_history_messages);
                self.store.clear(turn.conversation_id).await?;
                self.store.save(turn.conversation_id, &state).await?;
                debug!(intent = %state.intent_name, status = %state.status, "State replaced");
            }
        }

        Ok(DialogueReply {
            reply: outcome.reply,
            is_task_finished: outcome.finished,
        })
    }

    /// Ask the oracle which of `allowed` the utterance expresses. Failures,
    /// timeouts and matches outside `allowed` all yield `NoIntent`.
    async fn extract(&self, turn: &Turn<'_>, allowed: &[IntentMetadata]) -> IntentExtraction {
        if allowed.is_empty() {
            return IntentExtraction::NoIntent;
        }

        let call = self.oracle.extract_intent(&turn.context, allowed);
        match tokio::time::timeout(self.oracle_timeout, call).await {
            Ok(Ok(IntentExtraction::Matched {
                intent_name,
                arguments,
            })) => {
                if allowed.iter().any(|intent| intent.name == intent_name) {
                    IntentExtraction::Matched {
                        intent_name,
                        arguments,
                    }
                } else {
                    debug!(intent = %intent_name, "Discarding match outside the allowed intents");
                    IntentExtraction::NoIntent
                }
            }
            Ok(Ok(IntentExtraction::NoIntent)) => IntentExtraction::NoIntent,
            Ok(Err(err)) => {
                warn!(error = %err, "Intent extraction failed");
                IntentExtraction::NoIntent
            }
            Err(_) => {
                warn!(timeout_secs = self.oracle_timeout.as_secs(), "Intent extraction timed out");
                IntentExtraction::NoIntent
            }
        }
    }

    async fn summarize(&self, turn: &Turn<'_>, result: &ActionResult) -> String {
        let call = self.oracle.summarize(&turn.context, result);
        match tokio::time::timeout(self.oracle_timeout, call).await {
            Ok(Ok(summary)) if !summary.trim().is_empty() => summary,
            Ok(Ok(_)) => fallback_summary(result),
            Ok(Err(err)) => {
                warn!(error = %err, "Summarization failed, using fallback text");
                fallback_summary(result)
            }
            Err(_) => {
                warn!("Summarization timed out, using fallback text");
                fallback_summary(result)
            }
        }
    }

    async fn free_chat(&self, turn: &Turn<'_>) -> String {
        let call = self.oracle.free_chat(&turn.context);
        match tokio::time::timeout(self.oracle_timeout, call).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => FREE_CHAT_FALLBACK.to_string(),
            Ok(Err(err)) => {
                warn!(error = %err, "Free chat failed, using fallback text");
                FREE_CHAT_FALLBACK.to_string()
            }
            Err(_) => {
                warn!("Free chat timed out, using fallback text");
                FREE_CHAT_FALLBACK.to_string()
            }
        }
    }

    fn next_question(&self, state: &DialogueState) -> String {
        state
            .next_missing_slot()
            .map_or_else(|| confirmation_message(state), |slot| self.registry.question_for(slot))
    }

    /// What the active task is waiting for: a slot, or a confirmation.
    fn pending_prompt(&self, state: &DialogueState) -> String {
        match state.status {
            DialogueStatus::ConfirmationPending => confirmation_message(state),
            DialogueStatus::GatheringInfo => self.next_question(state),
        }
    }

    fn is_affirmative(&self, message: &str) -> bool {
        contains_phrase(message, &self.config.affirmative_phrases)
    }

    fn is_cancel(&self, message: &str) -> bool {
        contains_phrase(message, &self.config.cancel_phrases)
    }
}

fn contains_phrase(message: &str, phrases: &[String]) -> bool {
    let message = message.to_lowercase();
    phrases
        .iter()
        .filter(|phrase| !phrase.trim().is_empty())
        .any(|phrase| message.contains(&phrase.to_lowercase()))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lists required slots in declaration order, then any extra collected ones.
fn confirmation_message(state: &DialogueState) -> String {
    let mut lines = vec![format!("Please confirm the details for {}:", state.intent_name)];

    let required = state.required_slots.iter();
    let extras = state
        .collected_slots
        .keys()
        .filter(|name| !state.required_slots.contains(name));

    for name in required.chain(extras) {
        if let Some(value) = state.collected_slots.get(name) {
            lines.push(format!("- {name}: {}", display_value(value)));
        }
    }

    lines.push("Is this correct?".to_string());
    lines.join("\n")
}

/// Read `(slot_name, slot_value)` from a modify-slot extraction.
fn parse_slot_modification(arguments: &SlotValues) -> Option<(String, Value)> {
    let slot_name = arguments.get("slot_name")?.as_str()?.trim();
    if slot_name.is_empty() {
        return None;
    }
    let value = match arguments.get("slot_value")? {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    };
    Some((slot_name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> SlotValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_contains_phrase_is_case_insensitive() {
        let phrases = vec!["yes".to_string(), "没错".to_string(), String::new()];
        assert!(contains_phrase("YES, correct", &phrases));
        assert!(contains_phrase("嗯，没错", &phrases));
        assert!(!contains_phrase("no", &phrases));
    }

    #[test]
    fn test_confirmation_lists_required_then_extras() {
        let mut state = DialogueState::new(
            "c",
            "stock_purchase",
            vec!["ticker".into(), "quantity".into()],
            &args(&[("quantity", json!(100)), ("ticker", json!("AAPL")), ("broker", json!("x"))]),
        );
        state.mark_confirmation_pending().unwrap();
        assert_eq!(
            confirmation_message(&state),
            "Please confirm the details for stock_purchase:\n- ticker: AAPL\n- quantity: 100\n- broker: x\nIs this correct?"
        );
    }

    #[test]
    fn test_parse_slot_modification() {
        assert_eq!(
            parse_slot_modification(&args(&[("slot_name", json!("quantity")), ("slot_value", json!(50))])),
            Some(("quantity".to_string(), json!(50)))
        );
        assert_eq!(
            parse_slot_modification(&args(&[("slot_name", json!(" ticker ")), ("slot_value", json!(" MSFT "))])),
            Some(("ticker".to_string(), json!("MSFT")))
        );
        assert!(parse_slot_modification(&args(&[("slot_name", json!("ticker"))])).is_none());
        assert!(parse_slot_modification(&args(&[("slot_name", json!(5)), ("slot_value", json!("x"))])).is_none());
        assert!(parse_slot_modification(&args(&[("slot_name", json!("ticker")), ("slot_value", Value::Null)])).is_none());
    }
}
