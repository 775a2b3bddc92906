use serde::{Deserialize, Serialize};

/// Main configuration structure for Parley
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Language oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Dialogue engine behaviour
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// State store backend selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Intent catalog source
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".parley/parley.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Oracle provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OracleProvider {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Scripted in-process oracle with keyword matching
    Mock,
}

impl OracleProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

/// Language oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OracleConfig {
    #[serde(default)]
    pub provider: OracleProvider,

    /// Model identifier; provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// API base URL; provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key; read from the provider's environment variable when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

const fn default_oracle_timeout_secs() -> u64 {
    30
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_temperature() -> f32 {
    0.0
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: default_oracle_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Dialogue engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DialogueConfig {
    /// Phrases that confirm a pending task (case-insensitive substring match)
    #[serde(default = "default_affirmative_phrases")]
    pub affirmative_phrases: Vec<String>,

    /// Phrases that abandon the active task
    #[serde(default = "default_cancel_phrases")]
    pub cancel_phrases: Vec<String>,

    /// Control intent used to correct a slot while confirming
    #[serde(default = "default_modify_slot_intent")]
    pub modify_slot_intent: String,

    /// Per-action timeout in seconds
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Conversation turns kept in state for oracle context
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,

    /// Maximum number of suspended parent tasks
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,

    /// Run a resumed parent straight away instead of confirming it again
    #[serde(default)]
    pub redispatch_resumed_intent: bool,
}

/// Matched as substrings, so none of these may occur inside a common
/// negation ("correct" in "incorrect", "对" in "不对").
fn default_affirmative_phrases() -> Vec<String> {
    ["yes", "go ahead", "没错", "好的"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cancel_phrases() -> Vec<String> {
    ["cancel", "never mind", "nevermind", "取消"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_modify_slot_intent() -> String {
    "modify_slot".to_string()
}

const fn default_action_timeout_secs() -> u64 {
    30
}

const fn default_max_history_messages() -> usize {
    20
}

const fn default_max_dependency_depth() -> usize {
    3
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            affirmative_phrases: default_affirmative_phrases(),
            cancel_phrases: default_cancel_phrases(),
            modify_slot_intent: default_modify_slot_intent(),
            action_timeout_secs: default_action_timeout_secs(),
            max_history_messages: default_max_history_messages(),
            max_dependency_depth: default_max_dependency_depth(),
            redispatch_resumed_intent: false,
        }
    }
}

/// State store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Intent catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    /// YAML catalog file; the built-in catalog is used when unset
    #[serde(default)]
    pub catalog_path: Option<String>,
}
