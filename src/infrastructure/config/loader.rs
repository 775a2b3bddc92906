use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project configuration, relative to the working directory
pub const CONFIG_DIR: &str = ".parley";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "PARLEY_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {0} timeout: must be at least 1 second")]
    InvalidTimeout(&'static str),

    #[error("Invalid temperature: {0}. Must be between 0.0 and 2.0")]
    InvalidTemperature(f32),

    #[error("At least one affirmative phrase is required")]
    NoAffirmativePhrases,

    #[error("Invalid max_dependency_depth: {0}. Must be at least 1")]
    InvalidDependencyDepth(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .parley/config.yaml (project config, created by init)
    /// 3. .parley/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PARLEY_* prefix, `__` between sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], with the project rooted at `root`
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.oracle.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("oracle"));
        }

        if !(0.0..=2.0).contains(&config.oracle.temperature) {
            return Err(ConfigError::InvalidTemperature(config.oracle.temperature));
        }

        let dialogue = &config.dialogue;
        if dialogue.action_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("action"));
        }

        if dialogue
            .affirmative_phrases
            .iter()
            .all(|phrase| phrase.trim().is_empty())
        {
            return Err(ConfigError::NoAffirmativePhrases);
        }

        if dialogue.modify_slot_intent.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "modify_slot_intent cannot be empty".to_string(),
            ));
        }

        if dialogue.max_dependency_depth == 0 {
            return Err(ConfigError::InvalidDependencyDepth(
                dialogue.max_dependency_depth,
            ));
        }

        if let Some(path) = &config.registry.catalog_path {
            if path.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "registry.catalog_path cannot be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{OracleProvider, StoreBackend};
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.path, ".parley/parley.db");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.oracle.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTimeout("oracle")
        ));

        let mut config = Config::default();
        config.dialogue.action_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTimeout("action")
        ));
    }

    #[test]
    fn test_validate_blank_affirmative_phrases() {
        let mut config = Config::default();
        config.dialogue.affirmative_phrases = vec![" ".to_string()];

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::NoAffirmativePhrases
        ));
    }

    #[test]
    fn test_validate_zero_dependency_depth() {
        let mut config = Config::default();
        config.dialogue.max_dependency_depth = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidDependencyDepth(0)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("config.yaml"),
            "oracle:\n  provider: anthropic\n  timeout_secs: 10\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        fs::write(
            config_dir.join("local.yaml"),
            "oracle:\n  provider: mock\nlogging:\n  level: debug\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.oracle.provider, OracleProvider::Mock, "Local override should win");
        assert_eq!(config.oracle.timeout_secs, 10, "Base value should persist");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                ("PARLEY_STORE__BACKEND", Some("memory")),
                ("PARLEY_DIALOGUE__MAX_DEPENDENCY_DEPTH", Some("7")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.store.backend, StoreBackend::Memory);
                assert_eq!(config.dialogue.max_dependency_depth, 7);
            },
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/parley.yaml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "logging:\n  rotation: weekly\n").unwrap();

        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid log rotation"));
    }
}
