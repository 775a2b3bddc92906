//! Action invocation and outcome models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dialogue::SlotValues;

/// Outcome of running a business action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ActionResult {
    #[serde(rename = "SUCCESS")]
    Success {
        #[serde(default)]
        data: Value,
    },
    /// Another intent must complete before this one can run.
    #[serde(rename = "PRECONDITION_FAILED")]
    PreconditionFailed {
        #[serde(rename = "missingDependency")]
        missing_dependency: String,
    },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl ActionResult {
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    pub fn precondition_failed(missing_dependency: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            missing_dependency: missing_dependency.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "SUCCESS",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Error { .. } => "ERROR",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Everything a handler receives for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub conversation_id: String,
    pub intent_name: String,
    pub arguments: SlotValues,
}

impl ActionRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        intent_name: impl Into<String>,
        arguments: SlotValues,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            intent_name: intent_name.into(),
            arguments,
        }
    }

    /// String argument, accepting numbers and booleans in their display form.
    pub fn text(&self, slot: &str) -> Option<String> {
        match self.arguments.get(slot)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Integer argument, accepting numeric strings.
    pub fn integer(&self, slot: &str) -> Option<i64> {
        match self.arguments.get(slot)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(ActionResult::precondition_failed("open_account")).unwrap();
        assert_eq!(
            value,
            json!({"status": "PRECONDITION_FAILED", "missingDependency": "open_account"})
        );

        let value = serde_json::to_value(ActionResult::error("boom")).unwrap();
        assert_eq!(value, json!({"status": "ERROR", "message": "boom"}));

        let parsed: ActionResult =
            serde_json::from_value(json!({"status": "SUCCESS", "data": {"id": 1}})).unwrap();
        assert!(parsed.is_success());
    }

    #[test]
    fn test_request_argument_coercion() {
        let mut args = SlotValues::new();
        args.insert("quantity".into(), json!("100"));
        args.insert("ticker".into(), json!("AAPL"));
        args.insert("flag".into(), json!(true));
        args.insert("empty".into(), Value::Null);
        let request = ActionRequest::new("c", "stock_purchase", args);

        assert_eq!(request.integer("quantity"), Some(100));
        assert_eq!(request.text("ticker").as_deref(), Some("AAPL"));
        assert_eq!(request.text("flag").as_deref(), Some("true"));
        assert_eq!(request.text("empty"), None);
        assert_eq!(request.integer("missing"), None);
    }
}
