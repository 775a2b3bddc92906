//! Dialogue state store port (trait) for dependency injection.
//!
//! Defines the contract for per-conversation state persistence. The dialogue
//! engine depends on this trait, not on a concrete backend.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::DialogueState;

/// Keyed persistence of dialogue state.
///
/// Implementations guarantee atomicity per `conversation_id` only; distinct
/// conversations may be read and written concurrently.
#[async_trait]
pub trait DialogueStateStore: Send + Sync {
    /// Retrieves the active state for a conversation
    ///
    /// # Returns
    /// - `Some(DialogueState)` while a task is in progress
    /// - `None` when the conversation is idle
    ///
    /// # Errors
    /// Returns `DomainError::DatabaseError` if the backend fails, or
    /// `DomainError::SerializationError` if the stored record is corrupt
    async fn get(&self, conversation_id: &str) -> DomainResult<Option<DialogueState>>;

    /// Inserts or replaces the state for a conversation
    ///
    /// # Errors
    /// Returns error if the backend fails or the state cannot be serialized
    async fn save(&self, conversation_id: &str, state: &DialogueState) -> DomainResult<()>;

    /// Removes the state for a conversation. Clearing an idle conversation
    /// is not an error.
    ///
    /// # Errors
    /// Returns error if the backend fails
    async fn clear(&self, conversation_id: &str) -> DomainResult<()>;

    /// Lists active states, most recently updated first
    ///
    /// # Errors
    /// Returns error if the backend fails
    async fn list(&self, limit: usize) -> DomainResult<Vec<DialogueState>>;
}
