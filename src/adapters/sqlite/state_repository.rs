//! SQLite implementation of the DialogueStateStore.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{parse_datetime, parse_json_or_default};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DialogueState, DialogueStatus};
use crate::domain::ports::DialogueStateStore;

/// Fixed-width UTC timestamps so `ORDER BY updated_at` sorts chronologically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DialogueStateStore for SqliteStateStore {
    async fn get(&self, conversation_id: &str) -> DomainResult<Option<DialogueState>> {
        let row: Option<DialogueStateRow> = sqlx::query_as(
            "SELECT * FROM dialogue_states WHERE conversation_id = ?"
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save(&self, conversation_id: &str, state: &DialogueState) -> DomainResult<()> {
        let required_slots = serde_json::to_string(&state.required_slots)?;
        let collected_slots = serde_json::to_string(&state.collected_slots)?;
        let originating_intent = state
            .originating_intent
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let history = serde_json::to_string(&state.history)?;

        sqlx::query(
            r#"INSERT INTO dialogue_states (conversation_id, intent_name, status, required_slots, collected_slots, originating_intent, history, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(conversation_id) DO UPDATE SET
                   intent_name = excluded.intent_name,
                   status = excluded.status,
                   required_slots = excluded.required_slots,
                   collected_slots = excluded.collected_slots,
                   originating_intent = excluded.originating_intent,
                   history = excluded.history,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at"#
        )
        .bind(conversation_id)
        .bind(&state.intent_name)
        .bind(state.status.as_str())
        .bind(required_slots)
        .bind(collected_slots)
        .bind(originating_intent)
        .bind(history)
        .bind(timestamp(&state.created_at))
        .bind(timestamp(&state.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(conversation_id, intent = %state.intent_name, status = %state.status, "Saved dialogue state");
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM dialogue_states WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        debug!(conversation_id, removed = result.rows_affected(), "Cleared dialogue state");
        Ok(())
    }

    async fn list(&self, limit: usize) -> DomainResult<Vec<DialogueState>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<DialogueStateRow> = sqlx::query_as(
            "SELECT * FROM dialogue_states ORDER BY updated_at DESC LIMIT ?"
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DialogueStateRow {
    conversation_id: String,
    intent_name: String,
    status: String,
    required_slots: String,
    collected_slots: String,
    originating_intent: Option<String>,
    history: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<DialogueStateRow> for DialogueState {
    type Error = DomainError;

    fn try_from(row: DialogueStateRow) -> Result<Self, Self::Error> {
        let status = DialogueStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid dialogue status: {}", row.status)))?;

        Ok(DialogueState {
            conversation_id: row.conversation_id,
            intent_name: row.intent_name,
            required_slots: serde_json::from_str(&row.required_slots)?,
            collected_slots: serde_json::from_str(&row.collected_slots)?,
            status,
            originating_intent: row
                .originating_intent
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            history: parse_json_or_default(Some(row.history))?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
