//! In-memory DialogueStateStore for tests and single-process use.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::DialogueState;
use crate::domain::ports::DialogueStateStore;

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, DialogueState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl DialogueStateStore for InMemoryStateStore {
    async fn get(&self, conversation_id: &str) -> DomainResult<Option<DialogueState>> {
        Ok(self.states.read().await.get(conversation_id).cloned())
    }

    async fn save(&self, conversation_id: &str, state: &DialogueState) -> DomainResult<()> {
        self.states
            .write()
            .await
            .insert(conversation_id.to_string(), state.clone());
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> DomainResult<()> {
        self.states.write().await.remove(conversation_id);
        Ok(())
    }

    async fn list(&self, limit: usize) -> DomainResult<Vec<DialogueState>> {
        let mut states: Vec<DialogueState> = self.states.read().await.values().cloned().collect();
        states.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        states.truncate(limit);
        Ok(states)
    }
}
