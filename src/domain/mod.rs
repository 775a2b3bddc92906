//! Domain layer for the Parley dialogue orchestrator
//!
//! This module contains the dialogue data model, the collaborator ports and
//! the domain error type.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
