//! Parley - multi-turn task dialogue orchestrator
//!
//! Parley turns free-form user messages into executed tasks. Each turn the
//! engine classifies the utterance with a language oracle, gathers the
//! slots the task needs one question at a time, asks for confirmation, and
//! dispatches the task to its action handler. A task whose precondition is
//! unmet is suspended while the prerequisite task is gathered, then resumed
//! with its original arguments.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): dialogue models, errors and port traits
//! - **Service Layer** (`services`): intent registry, action dispatch and the dialogue engine
//! - **Adapters** (`adapters`): state stores (`SQLite`, in-memory) and oracles (`OpenAI`, Anthropic, mock)
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and bootstrap
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use parley::infrastructure::setup::{build_engine, load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = build_engine(&load_config(None)?).await?;
//!     let reply = engine.process_message("buy 100 shares of AAPL", "demo").await?;
//!     println!("{}", reply.reply);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    ActionResult, Config, DialogueReply, DialogueState, DialogueStatus, IntentExtraction,
    IntentMetadata, OriginatingIntent,
};
pub use domain::ports::{ActionHandler, DialogueStateStore, Oracle};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ActionDispatcher, DialogueEngine, IntentRegistry};
