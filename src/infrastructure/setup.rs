//! Parley setup and bootstrap infrastructure
//!
//! Handles project initialization and wiring of the dialogue engine:
//! - Configuration directory creation
//! - Default config file creation
//! - Database migrations
//! - Registry, state store, oracle and action handler assembly

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapters::memory::InMemoryStateStore;
use crate::adapters::oracle::create_oracle;
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteStateStore};
use crate::domain::models::{Config, StoreBackend};
use crate::domain::ports::DialogueStateStore;
use crate::infrastructure::config::{ConfigLoader, CONFIG_DIR};
use crate::services::builtin_actions::{builtin_handlers, AccountLedger};
use crate::services::{ActionDispatcher, DialogueEngine, IntentRegistry};

/// Default configuration template content
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Parley Configuration
# Override settings by editing this file, adding .parley/local.yaml, or setting
# environment variables with the PARLEY_ prefix
#
# Example environment variables:
#   export PARLEY_ORACLE__PROVIDER=anthropic
#   export PARLEY_STORE__BACKEND=memory
#   export PARLEY_LOGGING__LEVEL=debug

# Database configuration
database:
  # Path to SQLite database file (project-local)
  path: ".parley/parley.db"

  # Maximum number of database connections in pool
  max_connections: 5

# Logging configuration
logging:
  # Log level: trace, debug, info, warn, error
  level: "info"

  # Log format: json, pretty
  format: "pretty"

  # Rotation for files under log_dir: daily, hourly, never
  rotation: "daily"

# Language oracle
oracle:
  # Provider: openai, anthropic, mock
  # API keys are read from OPENAI_API_KEY or ANTHROPIC_API_KEY
  provider: "openai"
  timeout_secs: 30
  max_tokens: 1024
  temperature: 0.0

# Dialogue behaviour
dialogue:
  # Matched as substrings; avoid phrases found inside negations ("incorrect")
  affirmative_phrases: ["yes", "go ahead", "没错", "好的"]
  cancel_phrases: ["cancel", "never mind", "nevermind", "取消"]
  action_timeout_secs: 30
  max_history_messages: 20
  max_dependency_depth: 3
  # Run a task suspended on a prerequisite as soon as the prerequisite
  # succeeds, instead of asking for confirmation again
  redispatch_resumed_intent: false

# Where in-flight dialogue state is kept: sqlite, memory
store:
  backend: "sqlite"

# Intent catalog; the built-in catalog is used when unset
registry: {}
"#;

/// Setup paths and directories
#[derive(Debug, Clone)]
pub struct SetupPaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
}

impl SetupPaths {
    /// Paths for a project rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_dir = root.join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            database_file: config_dir.join("parley.db"),
            config_dir,
            root,
        }
    }

    /// Check if Parley is already initialized
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

/// What `initialize_project` did
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InitReport {
    pub config_dir_created: bool,
    pub config_written: bool,
    pub database_initialized: bool,
}

/// Create the configuration directory
pub fn create_config_dir(paths: &SetupPaths) -> Result<bool> {
    if paths.config_dir.exists() {
        return Ok(false);
    }
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")?;
    Ok(true)
}

/// Create the default configuration file
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.config_file.exists() && !force {
        return Ok(false);
    }
    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(true)
}

/// Run database migrations
pub async fn run_migrations(paths: &SetupPaths) -> Result<()> {
    let url = database_url(&paths.database_file.to_string_lossy());
    let pool = initialize_database(&url, None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;
    Ok(())
}

/// Create `.parley/`, the default config and the migrated database
pub async fn initialize_project(paths: &SetupPaths, force: bool) -> Result<InitReport> {
    let config_dir_created = create_config_dir(paths)?;
    let config_written = create_config_file(paths, force)?;
    run_migrations(paths).await?;

    info!(root = %paths.root.display(), "Project initialized");
    Ok(InitReport {
        config_dir_created,
        config_written,
        database_initialized: true,
    })
}

/// Load configuration from an explicit file or the working directory hierarchy
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Load the intent catalog named in the config, or the built-in one
pub async fn build_registry(config: &Config) -> Result<IntentRegistry> {
    let registry = match &config.registry.catalog_path {
        Some(path) => IntentRegistry::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load intent catalog from {path}"))?,
        None => IntentRegistry::builtin().context("Built-in intent catalog is invalid")?,
    };
    Ok(registry)
}

/// Open the configured state store backend
pub async fn build_state_store(config: &Config) -> Result<Arc<dyn DialogueStateStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStateStore::new())),
        StoreBackend::Sqlite => {
            let url = database_url(&config.database.path);
            let pool = initialize_database(
                &url,
                Some(PoolConfig::with_max_connections(config.database.max_connections)),
            )
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
            Ok(Arc::new(SqliteStateStore::new(pool)))
        }
    }
}

/// Register the built-in handlers and check every business intent has one
pub fn build_dispatcher(config: &Config, registry: &IntentRegistry) -> Result<ActionDispatcher> {
    let ledger = Arc::new(AccountLedger::new());
    let mut builder = ActionDispatcher::builder()
        .with_timeout(Duration::from_secs(config.dialogue.action_timeout_secs));
    for handler in builtin_handlers(ledger) {
        builder = builder.register(handler)?;
    }
    let dispatcher = builder.build();
    dispatcher
        .verify_covers(registry)
        .context("Intent catalog names intents without action handlers")?;
    Ok(dispatcher)
}

/// Wire the dialogue engine from configuration
pub async fn build_engine(config: &Config) -> Result<DialogueEngine> {
    let registry = build_registry(config).await?;
    let dispatcher = build_dispatcher(config, &registry)?;
    let store = build_state_store(config).await?;
    let oracle = create_oracle(&config.oracle).context("Failed to create language oracle")?;

    debug!(
        oracle = oracle.name(),
        store = ?config.store.backend,
        intents = registry.len(),
        "Dialogue engine ready"
    );

    Ok(DialogueEngine::new(
        Arc::new(registry),
        store,
        oracle,
        Arc::new(dispatcher),
        config.dialogue.clone(),
    )
    .with_oracle_timeout(Duration::from_secs(config.oracle.timeout_secs)))
}
