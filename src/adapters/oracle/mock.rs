//! In-process oracle for tests and offline demos.
//!
//! Scripted utterances take priority. Anything else is matched by keyword,
//! with `slot=value` or `slot: value` pairs read as arguments.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionResult, DialogueContext, IntentExtraction, IntentMetadata, SlotValues,
};
use crate::domain::ports::Oracle;
use crate::services::prompt_templates::fallback_summary;

fn default_keywords() -> HashMap<String, Vec<String>> {
    [
        ("open_account", vec!["open an account", "open account", "开户"]),
        ("stock_purchase", vec!["buy", "purchase", "shares", "买"]),
        ("check_weather", vec!["weather", "天气"]),
        ("modify_slot", vec!["change", "modify", "update", "修改"]),
    ]
    .into_iter()
    .map(|(intent, words)| {
        (
            intent.to_string(),
            words.into_iter().map(String::from).collect(),
        )
    })
    .collect()
}

fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

fn parse_value(raw: &str) -> Value {
    let raw = raw.trim().trim_matches(|c| c == ',' || c == '.');
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// `key=value` and `key: value` pairs, separated by commas or whitespace.
fn parse_pairs(utterance: &str) -> Vec<(String, Value)> {
    let tokens: Vec<&str> = utterance
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut pairs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let split = tokens[i]
            .split_once('=')
            .or_else(|| tokens[i].split_once(':'));
        match split {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                pairs.push((key.to_lowercase(), parse_value(value)));
            }
            Some((key, _)) if !key.is_empty() => {
                if let Some(next) = tokens.get(i + 1) {
                    pairs.push((key.to_lowercase(), parse_value(next)));
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    pairs
}

pub struct MockOracle {
    scripted: RwLock<HashMap<String, IntentExtraction>>,
    keywords: HashMap<String, Vec<String>>,
    extraction_calls: RwLock<Vec<Vec<String>>>,
    fail_extraction: AtomicBool,
    fail_replies: AtomicBool,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            scripted: RwLock::new(HashMap::new()),
            keywords: default_keywords(),
            extraction_calls: RwLock::new(Vec::new()),
            fail_extraction: AtomicBool::new(false),
            fail_replies: AtomicBool::new(false),
        }
    }

    /// Return `extraction` whenever `utterance` is seen and its intent is allowed.
    #[must_use]
    pub fn with_script(mut self, utterance: &str, extraction: IntentExtraction) -> Self {
        self.scripted
            .get_mut()
            .insert(normalize(utterance), extraction);
        self
    }

    #[must_use]
    pub fn with_keywords(mut self, intent: &str, keywords: &[&str]) -> Self {
        self.keywords.insert(
            intent.to_string(),
            keywords.iter().map(|k| (*k).to_lowercase()).collect(),
        );
        self
    }

    pub async fn script(&self, utterance: &str, extraction: IntentExtraction) {
        self.scripted
            .write()
            .await
            .insert(normalize(utterance), extraction);
    }

    /// Make every extraction call fail.
    pub fn set_fail_extraction(&self, fail: bool) {
        self.fail_extraction.store(fail, Ordering::SeqCst);
    }

    /// Make summarization and free chat fail.
    pub fn set_fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    /// Allowed intent names of each extraction call so far.
    pub async fn extraction_calls(&self) -> Vec<Vec<String>> {
        self.extraction_calls.read().await.clone()
    }

    fn keyword_match(&self, utterance: &str, allowed: &[IntentMetadata]) -> IntentExtraction {
        let lowered = normalize(utterance);
        let pairs = parse_pairs(utterance);

        for intent in allowed {
            let keywords = self.keywords.get(&intent.name);
            let named = keywords.is_some_and(|words| words.iter().any(|w| lowered.contains(w.as_str())));
            let has_slot = |name: &str| intent.slots.iter().any(|slot| slot.name == name);

            if has_slot("slot_name") && has_slot("slot_value") {
                if let Some((key, value)) = pairs.first().filter(|_| named) {
                    let mut arguments = SlotValues::new();
                    arguments.insert("slot_name".to_string(), Value::String(key.clone()));
                    arguments.insert("slot_value".to_string(), value.clone());
                    return IntentExtraction::matched(&intent.name, arguments);
                }
                continue;
            }

            let arguments: SlotValues = pairs
                .iter()
                .filter(|(key, _)| has_slot(key.as_str()))
                .cloned()
                .collect();

            if named || !arguments.is_empty() {
                return IntentExtraction::matched(&intent.name, arguments);
            }
        }

        IntentExtraction::NoIntent
    }
}

#[async_trait]
impl Oracle for MockOracle {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn extract_intent(
        &self,
        context: &DialogueContext,
        allowed: &[IntentMetadata],
    ) -> DomainResult<IntentExtraction> {
        self.extraction_calls
            .write()
            .await
            .push(allowed.iter().map(|i| i.name.clone()).collect());

        if self.fail_extraction.load(Ordering::SeqCst) {
            return Err(DomainError::OracleError("mock extraction failure".to_string()));
        }

        let utterance = context.latest_user_message();
        if let Some(scripted) = self.scripted.read().await.get(&normalize(utterance)) {
            let in_scope = scripted
                .intent_name()
                .is_some_and(|name| allowed.iter().any(|i| i.name == name));
            return Ok(if in_scope {
                scripted.clone()
            } else {
                IntentExtraction::NoIntent
            });
        }

        Ok(self.keyword_match(utterance, allowed))
    }

    async fn summarize(&self, _context: &DialogueContext, result: &ActionResult) -> DomainResult<String> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(DomainError::OracleError("mock summarization failure".to_string()));
        }
        Ok(fallback_summary(result))
    }

    async fn free_chat(&self, context: &DialogueContext) -> DomainResult<String> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(DomainError::OracleError("mock free chat failure".to_string()));
        }
        Ok(format!("You said: {}", context.latest_user_message()))
    }
}
