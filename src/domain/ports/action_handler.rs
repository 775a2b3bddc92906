//! Business action handler port.

use async_trait::async_trait;

use crate::domain::models::{ActionRequest, ActionResult};

/// A named business action.
///
/// Handlers report expected outcomes, including unmet preconditions, through
/// `ActionResult`. An `Err` is treated by the dispatcher as `ActionResult::Error`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Intent name this handler serves
    fn name(&self) -> &str;

    /// Execute the action with fully collected arguments
    async fn handle(&self, request: &ActionRequest) -> anyhow::Result<ActionResult>;
}
