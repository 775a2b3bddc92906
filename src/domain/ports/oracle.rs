//! Natural-language oracle port.
//!
//! The oracle performs the three language tasks the dialogue engine needs:
//! intent and slot extraction, action result summarization and free chat.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionResult, DialogueContext, IntentExtraction, IntentMetadata};

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Provider name, for logs and status output
    fn name(&self) -> &'static str;

    /// Decide which of `allowed` intents the latest utterance expresses and
    /// extract its arguments.
    ///
    /// The engine restricts `allowed` per call and discards matches outside
    /// that set, so implementations may return any intent they recognize.
    ///
    /// # Errors
    /// Returns `DomainError::OracleError` on transport or protocol failure
    async fn extract_intent(
        &self,
        context: &DialogueContext,
        allowed: &[IntentMetadata],
    ) -> DomainResult<IntentExtraction>;

    /// Describe an action outcome to the user in natural language
    ///
    /// # Errors
    /// Returns `DomainError::OracleError` on transport or protocol failure
    async fn summarize(&self, context: &DialogueContext, result: &ActionResult) -> DomainResult<String>;

    /// Reply conversationally when no task applies
    ///
    /// # Errors
    /// Returns `DomainError::OracleError` on transport or protocol failure
    async fn free_chat(&self, context: &DialogueContext) -> DomainResult<String>;
}
