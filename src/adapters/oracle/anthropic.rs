//! Anthropic Messages API oracle.
//!
//! Intent extraction offers the allowed intents as tools and reads the first
//! `tool_use` block of the reply.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::parse_arguments;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionResult, ChatMessage, ChatRole, DialogueContext, IntentExtraction, IntentMetadata,
    OracleConfig,
};
use crate::domain::ports::Oracle;
use crate::services::prompt_templates;

/// Configuration for the Anthropic oracle.
#[derive(Debug, Clone)]
pub struct AnthropicOracleConfig {
    /// API key (read from ANTHROPIC_API_KEY if not set)
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// API version header.
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AnthropicOracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_secs: 30,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl AnthropicOracleConfig {
    pub fn from_oracle_config(config: &OracleConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone().unwrap_or(defaults.base_url),
            model: config.model.clone().unwrap_or(defaults.model),
            api_version: defaults.api_version,
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    temperature: f32,
}

/// Content block in a response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

pub struct AnthropicOracle {
    config: AnthropicOracleConfig,
    client: Client,
}

impl AnthropicOracle {
    pub fn new(config: AnthropicOracleConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::OracleError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn tool_definition(intent: &IntentMetadata) -> Value {
        json!({
            "name": intent.name,
            "description": intent.description,
            "input_schema": intent.parameters_schema(),
        })
    }

    /// The Messages API requires the conversation to open with a user turn.
    fn messages(history: &[ChatMessage]) -> Vec<Message<'_>> {
        history
            .iter()
            .skip_while(|m| m.role != ChatRole::User)
            .map(|m| Message {
                role: m.role.as_str(),
                content: m.content.as_str(),
            })
            .collect()
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> DomainResult<MessagesResponse> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| DomainError::OracleError("ANTHROPIC_API_KEY not set".to_string()))?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| DomainError::OracleError(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::OracleError(format!("API error {status}: {body}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DomainError::OracleError(format!("Failed to parse response: {e}")))?;
        debug!(stop_reason = ?parsed.stop_reason, "Messages response received");
        Ok(parsed)
    }

    async fn complete_text(&self, system: &str, messages: Vec<Message<'_>>) -> DomainResult<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages,
            tools: Vec::new(),
            tool_choice: None,
            temperature: self.config.temperature,
        };

        let text = self
            .send(&request)
            .await?
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(DomainError::OracleError("Response contained no text".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    #[instrument(skip_all, fields(conversation_id = %context.conversation_id))]
    async fn extract_intent(
        &self,
        context: &DialogueContext,
        allowed: &[IntentMetadata],
    ) -> DomainResult<IntentExtraction> {
        let system = prompt_templates::slot_extraction_prompt(allowed);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: &system,
            messages: Self::messages(&context.history),
            tools: allowed.iter().map(Self::tool_definition).collect(),
            tool_choice: Some(json!({"type": "auto"})),
            temperature: self.config.temperature,
        };

        let response = self.send(&request).await?;
        let tool_use = response.content.into_iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input } => Some((name, input)),
            _ => None,
        });

        match tool_use {
            Some((name, input)) => Ok(IntentExtraction::matched(name, parse_arguments(&input)?)),
            None => Ok(IntentExtraction::NoIntent),
        }
    }

    async fn summarize(&self, context: &DialogueContext, result: &ActionResult) -> DomainResult<String> {
        let system = prompt_templates::summarization_prompt(context.latest_user_message(), result);
        let messages = vec![Message {
            role: "user",
            content: "Please summarize the outcome for me.",
        }];
        self.complete_text(&system, messages).await
    }

    async fn free_chat(&self, context: &DialogueContext) -> DomainResult<String> {
        self.complete_text(prompt_templates::free_chat_prompt(), Self::messages(&context.history))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnthropicOracleConfig::from_oracle_config(&OracleConfig::default());
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.api_version, "2023-06-01");
    }

    #[test]
    fn test_messages_start_with_user() {
        let history = vec![
            ChatMessage::assistant("welcome"),
            ChatMessage::user("buy AAPL"),
            ChatMessage::assistant("how many?"),
        ];
        let messages = AnthropicOracle::messages(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_unknown_content_block_is_tolerated() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "tool_use", "id": "t1", "name": "check_weather", "input": {}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();
        assert!(matches!(response.content[0], ContentBlock::Other));
        assert!(matches!(response.content[1], ContentBlock::ToolUse { .. }));
    }
}
