//! Domain errors for the Parley dialogue system.

use thiserror::Error;

/// Format a dependency chain as a human-readable string: `a -> b -> a`.
fn format_dependency_chain(chain: &[String]) -> String {
    chain.join(" -> ")
}

/// Domain-level errors that can occur in the Parley system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Intent not found: {0}")]
    IntentNotFound(String),

    #[error("No action handler registered for intent: {0}")]
    HandlerNotFound(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Intent dependency cycle detected: {}", format_dependency_chain(.0))]
    DependencyCycle(Vec<String>),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_cycle_message() {
        let err = DomainError::DependencyCycle(vec![
            "stock_purchase".to_string(),
            "open_account".to_string(),
            "stock_purchase".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Intent dependency cycle detected: stock_purchase -> open_account -> stock_purchase"
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DomainError = parse_err.into();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }
}
