//! OpenAI-compatible chat completions oracle.
//!
//! Intent extraction uses function calling: each allowed intent becomes a
//! `function` tool, and the first tool call in the reply is the match.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::parse_arguments;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionResult, ChatMessage, DialogueContext, IntentExtraction, IntentMetadata, OracleConfig,
};
use crate::domain::ports::Oracle;
use crate::services::prompt_templates;

/// Configuration for the OpenAI-compatible oracle.
#[derive(Debug, Clone)]
pub struct OpenAiOracleConfig {
    /// API key (read from OPENAI_API_KEY if not set)
    pub api_key: Option<String>,
    /// Base URL up to and including the version segment
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAiOracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl OpenAiOracleConfig {
    pub fn from_oracle_config(config: &OracleConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone().unwrap_or(defaults.base_url),
            model: config.model.clone().unwrap_or(defaults.model),
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct OpenAiOracle {
    config: OpenAiOracleConfig,
    client: Client,
}

impl OpenAiOracle {
    pub fn new(config: OpenAiOracleConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::OracleError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn tool_definition(intent: &IntentMetadata) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": intent.name,
                "description": intent.description,
                "parameters": intent.parameters_schema(),
            }
        })
    }

    fn messages<'a>(system: &'a str, history: &'a [ChatMessage]) -> Vec<RequestMessage<'a>> {
        std::iter::once(RequestMessage {
            role: "system",
            content: system,
        })
        .chain(history.iter().map(|m| RequestMessage {
            role: m.role.as_str(),
            content: m.content.as_str(),
        }))
        .collect()
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> DomainResult<AssistantMessage> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| DomainError::OracleError("OPENAI_API_KEY not set".to_string()))?;
        let request_id = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Request-ID", &request_id)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| DomainError::OracleError(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::OracleError(format!("API error {status}: {body}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| DomainError::OracleError(format!("Failed to parse response: {e}")))?;
        debug!(request_id = %request_id, "Chat completion received");

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| DomainError::OracleError("Response contained no choices".to_string()))
    }

    async fn complete_text(&self, system: &str, history: &[ChatMessage]) -> DomainResult<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: Self::messages(system, history),
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let message = self.complete(&request).await?;
        message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| DomainError::OracleError("Response contained no text".to_string()))
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip_all, fields(conversation_id = %context.conversation_id))]
    async fn extract_intent(
        &self,
        context: &DialogueContext,
        allowed: &[IntentMetadata],
    ) -> DomainResult<IntentExtraction> {
        let system = prompt_templates::slot_extraction_prompt(allowed);
        let request = CompletionRequest {
            model: &self.config.model,
            messages: Self::messages(&system, &context.history),
            tools: allowed.iter().map(Self::tool_definition).collect(),
            tool_choice: Some("auto"),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let message = self.complete(&request).await?;
        let Some(call) = message.tool_calls.into_iter().next() else {
            return Ok(IntentExtraction::NoIntent);
        };

        let arguments = parse_arguments(&call.function.arguments)?;
        Ok(IntentExtraction::matched(call.function.name, arguments))
    }

    async fn summarize(&self, context: &DialogueContext, result: &ActionResult) -> DomainResult<String> {
        let system = prompt_templates::summarization_prompt(context.latest_user_message(), result);
        self.complete_text(&system, &[]).await
    }

    async fn free_chat(&self, context: &DialogueContext) -> DomainResult<String> {
        self.complete_text(prompt_templates::free_chat_prompt(), &context.history)
            .await
    }
}
