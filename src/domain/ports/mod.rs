//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - DialogueStateStore: per-conversation state persistence
//! - Oracle: intent extraction, summarization and free chat
//! - ActionHandler: business actions invoked by the dispatcher

pub mod action_handler;
pub mod oracle;
pub mod state_store;

pub use action_handler::ActionHandler;
pub use oracle::Oracle;
pub use state_store::DialogueStateStore;
