//! CLI command implementations.

pub mod chat;
pub mod init;
pub mod intents;
pub mod send;
pub mod state;
