pub mod action;
pub mod config;
pub mod dialogue;
pub mod intent;

pub use action::{ActionRequest, ActionResult};
pub use config::{
    Config, DatabaseConfig, DialogueConfig, LoggingConfig, OracleConfig, OracleProvider,
    RegistryConfig, StoreBackend, StoreConfig,
};
pub use dialogue::{
    ChatMessage, ChatRole, DialogueContext, DialogueReply, DialogueState, DialogueStatus,
    OriginatingIntent, SlotValues,
};
pub use intent::{IntentExtraction, IntentKind, IntentMetadata, SlotDefinition, SlotType};
