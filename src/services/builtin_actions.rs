//! Demonstration business actions for the built-in intent catalog.
//!
//! Accounts are tracked per conversation in an in-process [`AccountLedger`],
//! which lets `stock_purchase` report an unmet `open_account` precondition.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{ActionRequest, ActionResult};
use crate::domain::ports::ActionHandler;

/// City reported by `check_weather` when none is given.
pub const DEFAULT_WEATHER_CITY: &str = "Hangzhou";

/// Opened accounts keyed by conversation id.
#[derive(Debug, Default)]
pub struct AccountLedger {
    accounts: RwLock<HashMap<String, String>>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_for(&self, conversation_id: &str) -> Option<String> {
        self.accounts.read().await.get(conversation_id).cloned()
    }

    pub async fn has_account(&self, conversation_id: &str) -> bool {
        self.accounts.read().await.contains_key(conversation_id)
    }

    /// Record a new account and return its id.
    pub async fn open(&self, conversation_id: &str) -> String {
        let account_id = format!("ACC-{}", Uuid::new_v4().simple());
        self.accounts
            .write()
            .await
            .insert(conversation_id.to_string(), account_id.clone());
        account_id
    }
}

fn missing_arguments(request: &ActionRequest, names: &[&str]) -> Option<ActionResult> {
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| request.text(name).is_none_or(|v| v.trim().is_empty()))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(ActionResult::error(format!(
            "Missing required arguments for {}: {}",
            request.intent_name,
            missing.join(", ")
        )))
    }
}

pub struct OpenAccountHandler {
    ledger: Arc<AccountLedger>,
}

impl OpenAccountHandler {
    pub fn new(ledger: Arc<AccountLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ActionHandler for OpenAccountHandler {
    fn name(&self) -> &str {
        "open_account"
    }

    async fn handle(&self, request: &ActionRequest) -> anyhow::Result<ActionResult> {
        if let Some(error) = missing_arguments(request, &["education", "occupation", "address"]) {
            return Ok(error);
        }

        if let Some(existing) = self.ledger.account_for(&request.conversation_id).await {
            return Ok(ActionResult::success(json!({
                "account_id": existing,
                "message": "An account is already open for this user.",
            })));
        }

        let occupation = request.text("occupation").unwrap_or_default();
        let account_id = self.ledger.open(&request.conversation_id).await;
        info!(
            conversation_id = %request.conversation_id,
            account_id = %account_id,
            "Opened account"
        );

        Ok(ActionResult::success(json!({
            "account_id": account_id,
            "message": format!("Account opened for a user working as {occupation}."),
        })))
    }
}

pub struct StockPurchaseHandler {
    ledger: Arc<AccountLedger>,
}

impl StockPurchaseHandler {
    pub fn new(ledger: Arc<AccountLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ActionHandler for StockPurchaseHandler {
    fn name(&self) -> &str {
        "stock_purchase"
    }

    async fn handle(&self, request: &ActionRequest) -> anyhow::Result<ActionResult> {
        let Some(account_id) = self.ledger.account_for(&request.conversation_id).await else {
            return Ok(ActionResult::precondition_failed("open_account"));
        };

        if let Some(error) = missing_arguments(request, &["ticker", "quantity"]) {
            return Ok(error);
        }

        let ticker = request.text("ticker").unwrap_or_default().trim().to_uppercase();
        let quantity = match request.integer("quantity") {
            Some(q) if q > 0 => q,
            _ => {
                return Ok(ActionResult::error(
                    "Quantity must be a positive whole number of shares",
                ))
            }
        };

        let order_id = format!("ORD-{}", Uuid::new_v4().simple());
        info!(
            conversation_id = %request.conversation_id,
            order_id = %order_id,
            ticker = %ticker,
            quantity,
            "Placed stock purchase"
        );

        Ok(ActionResult::success(json!({
            "order_id": order_id,
            "account_id": account_id,
            "ticker": ticker,
            "quantity": quantity,
            "message": format!("Bought {quantity} shares of {ticker}."),
        })))
    }
}

pub struct CheckWeatherHandler;

#[async_trait]
impl ActionHandler for CheckWeatherHandler {
    fn name(&self) -> &str {
        "check_weather"
    }

    async fn handle(&self, request: &ActionRequest) -> anyhow::Result<ActionResult> {
        let city = request
            .text("city")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WEATHER_CITY.to_string());

        Ok(ActionResult::success(json!({
            "city": city,
            "weather": "sunny",
            "temperature": "25°C",
        })))
    }
}

/// Handlers for every business and digression intent of the built-in catalog.
pub fn builtin_handlers(ledger: Arc<AccountLedger>) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(OpenAccountHandler::new(Arc::clone(&ledger))),
        Arc::new(StockPurchaseHandler::new(ledger)),
        Arc::new(CheckWeatherHandler),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SlotValues;

    fn request(intent: &str, pairs: &[(&str, serde_json::Value)]) -> ActionRequest {
        let args: SlotValues = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        ActionRequest::new("conv-1", intent, args)
    }

    #[tokio::test]
    async fn test_purchase_requires_account() {
        let ledger = Arc::new(AccountLedger::new());
        let handler = StockPurchaseHandler::new(Arc::clone(&ledger));
        let req = request("stock_purchase", &[("ticker", json!("aapl")), ("quantity", json!(100))]);

        let result = handler.handle(&req).await.unwrap();
        assert_eq!(result, ActionResult::precondition_failed("open_account"));

        ledger.open("conv-1").await;
        let result = handler.handle(&req).await.unwrap();
        match result {
            ActionResult::Success { data } => {
                assert_eq!(data["ticker"], json!("AAPL"));
                assert_eq!(data["quantity"], json!(100));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_purchase_rejects_bad_quantity() {
        let ledger = Arc::new(AccountLedger::new());
        ledger.open("conv-1").await;
        let handler = StockPurchaseHandler::new(ledger);
        let req = request("stock_purchase", &[("ticker", json!("AAPL")), ("quantity", json!("-3"))]);
        assert!(matches!(
            handler.handle(&req).await.unwrap(),
            ActionResult::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_open_account_records_ledger() {
        let ledger = Arc::new(AccountLedger::new());
        let handler = OpenAccountHandler::new(Arc::clone(&ledger));
        let req = request(
            "open_account",
            &[
                ("education", json!("bachelor")),
                ("occupation", json!("engineer")),
                ("address", json!("1 Main St")),
            ],
        );
        assert!(handler.handle(&req).await.unwrap().is_success());
        assert!(ledger.has_account("conv-1").await);
        assert!(!ledger.has_account("conv-2").await);
    }

    #[tokio::test]
    async fn test_open_account_missing_arguments() {
        let handler = OpenAccountHandler::new(Arc::new(AccountLedger::new()));
        let req = request("open_account", &[("education", json!("bachelor"))]);
        match handler.handle(&req).await.unwrap() {
            ActionResult::Error { message } => {
                assert!(message.contains("occupation, address"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_weather_defaults_city() {
        let result = CheckWeatherHandler
            .handle(&request("check_weather", &[]))
            .await
            .unwrap();
        assert_eq!(
            result,
            ActionResult::success(json!({
                "city": "Hangzhou",
                "weather": "sunny",
                "temperature": "25°C",
            }))
        );
    }
}
