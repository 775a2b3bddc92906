//! Adapters for external systems: state stores and language oracles.

pub mod memory;
pub mod oracle;
pub mod sqlite;
