//! Routes an intent name to its registered business action handler.
//!
//! The handler map is assembled once through [`ActionDispatcherBuilder`] and
//! is read-only afterwards. Every failure mode of a handler (an `Err`, a
//! panic, or exceeding the action timeout) is normalized into
//! `ActionResult::Error`, so callers only ever see an `ActionResult`.

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionRequest, ActionResult, SlotValues};
use crate::domain::ports::ActionHandler;
use crate::services::intent_registry::IntentRegistry;

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Collects handlers before the dispatcher is frozen.
pub struct ActionDispatcherBuilder {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    timeout: Duration,
}

impl Default for ActionDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDispatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a handler under its own name
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if a handler with the same
    /// name is already registered
    pub fn register(mut self, handler: Arc<dyn ActionHandler>) -> DomainResult<Self> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(DomainError::ValidationFailed(format!(
                "Duplicate action handler for intent: {name}"
            )));
        }
        debug!(intent = %name, "Registered action handler");
        self.handlers.insert(name, handler);
        Ok(self)
    }

    pub fn build(self) -> ActionDispatcher {
        info!(handlers = self.handlers.len(), "Action dispatcher ready");
        ActionDispatcher {
            handlers: self.handlers,
            timeout: self.timeout,
        }
    }
}

pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn builder() -> ActionDispatcherBuilder {
        ActionDispatcherBuilder::new()
    }

    pub fn has_handler(&self, intent_name: &str) -> bool {
        self.handlers.contains_key(intent_name)
    }

    /// Registered intent names, sorted
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every business and digression intent has a handler
    ///
    /// # Errors
    /// Returns `DomainError::HandlerNotFound` naming the uncovered intents
    pub fn verify_covers(&self, registry: &IntentRegistry) -> DomainResult<()> {
        let missing: Vec<&str> = registry
            .business_intents()
            .into_iter()
            .chain(registry.digression_intents())
            .filter(|name| !self.has_handler(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DomainError::HandlerNotFound(missing.join(", ")))
        }
    }

    /// Run the handler for `intent_name` with the given arguments
    #[instrument(skip(self, arguments), fields(intent = %intent_name))]
    pub async fn dispatch(
        &self,
        conversation_id: &str,
        intent_name: &str,
        arguments: &SlotValues,
    ) -> ActionResult {
        let Some(handler) = self.handlers.get(intent_name) else {
            warn!(conversation_id, "No action handler registered");
            return ActionResult::error(
                DomainError::HandlerNotFound(intent_name.to_string()).to_string(),
            );
        };

        let request = ActionRequest::new(conversation_id, intent_name, arguments.clone());
        let call = AssertUnwindSafe(handler.handle(&request)).catch_unwind();

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => {
                warn!(conversation_id, error = %err, "Action handler failed");
                ActionResult::error(format!("{err:#}"))
            }
            Ok(Err(panic_info)) => {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!(conversation_id, panic = %message, "Action handler panicked");
                ActionResult::error(format!("Action '{intent_name}' panicked: {message}"))
            }
            Err(_) => {
                warn!(
                    conversation_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Action handler timed out"
                );
                ActionResult::error(format!(
                    "Action '{intent_name}' did not finish: {}",
                    DomainError::Timeout(self.timeout.as_secs())
                ))
            }
        };

        info!(conversation_id, status = result.status(), "Action dispatched");
        result
    }
}
