//! Oracle adapters: HTTP clients for hosted models and an in-process mock.

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::{AnthropicOracle, AnthropicOracleConfig};
pub use mock::MockOracle;
pub use openai::{OpenAiOracle, OpenAiOracleConfig};

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{OracleConfig, OracleProvider, SlotValues};
use crate::domain::ports::Oracle;

/// Read tool-call arguments, given either as a JSON object or as a string
/// containing one. Empty input yields no arguments.
pub fn parse_arguments(raw: &Value) -> DomainResult<SlotValues> {
    match raw {
        Value::Null => Ok(SlotValues::new()),
        Value::Object(map) => Ok(map.clone().into_iter().collect()),
        Value::String(s) if s.trim().is_empty() => Ok(SlotValues::new()),
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s)
                .map_err(|e| DomainError::OracleError(format!("Malformed tool arguments: {e}")))?;
            match parsed {
                Value::Object(map) => Ok(map.into_iter().collect()),
                other => Err(DomainError::OracleError(format!(
                    "Tool arguments must be an object, got: {other}"
                ))),
            }
        }
        other => Err(DomainError::OracleError(format!(
            "Tool arguments must be an object, got: {other}"
        ))),
    }
}

/// Build the oracle selected by `config.provider`.
pub fn create_oracle(config: &OracleConfig) -> DomainResult<Arc<dyn Oracle>> {
    let oracle: Arc<dyn Oracle> = match config.provider {
        OracleProvider::Openai => Arc::new(OpenAiOracle::new(OpenAiOracleConfig::from_oracle_config(config))?),
        OracleProvider::Anthropic => {
            Arc::new(AnthropicOracle::new(AnthropicOracleConfig::from_oracle_config(config))?)
        }
        OracleProvider::Mock => Arc::new(MockOracle::new()),
    };
    info!(provider = oracle.name(), "Oracle created");
    Ok(oracle)
}
