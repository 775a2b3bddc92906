pub mod action_dispatcher;
pub mod builtin_actions;
pub mod dialogue_engine;
pub mod intent_registry;
pub mod prompt_templates;

pub use action_dispatcher::{ActionDispatcher, ActionDispatcherBuilder};
pub use builtin_actions::{builtin_handlers, AccountLedger};
pub use dialogue_engine::DialogueEngine;
pub use intent_registry::{IntentCatalog, IntentRegistry};
