//! Infrastructure layer module
//!
//! Configuration loading, logging, and the bootstrap that wires adapters
//! into the dialogue engine.

pub mod config;
pub mod logging;
pub mod setup;
