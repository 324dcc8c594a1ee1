//! Configuration management for offcache

pub mod schema;

pub use schema::Config;

use crate::error::{OffcacheError, OffcacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Environment variables the origin server uses to stamp a deployment
pub mod env_vars {
    pub const APP_NAME: &str = "APP_NAME";
    pub const CACHE_VERSION: &str = "CACHE_VERSION";
    pub const FIRST_TIME_TIMEOUT: &str = "SW_FIRST_TIME_TIMEOUT";
    pub const RETURNING_USER_TIMEOUT: &str = "SW_RETURNING_USER_TIMEOUT";
    pub const ENABLE_LOGS: &str = "SW_ENABLE_LOGS";
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("offcache")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("offcache")
    }

    /// Resolve the store root, honoring `[store] path`
    pub fn store_dir(config: &Config) -> PathBuf {
        config
            .store
            .path
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("caches"))
    }

    /// Load configuration, falling back to defaults, then apply env overrides
    pub async fn load(&self) -> OffcacheResult<Config> {
        let mut config = if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            Config::default()
        } else {
            self.load_from_file(&self.config_path).await?
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> OffcacheResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| OffcacheError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| OffcacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> OffcacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            OffcacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> OffcacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OffcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply deployment overrides from the environment.
///
/// Unparseable timeouts keep the configured value. Logging is only disabled
/// by the literal string `false`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(name) = lookup(env_vars::APP_NAME).filter(|s| !s.is_empty()) {
        config.worker.app_name = name;
    }
    if let Some(version) = lookup(env_vars::CACHE_VERSION).filter(|s| !s.is_empty()) {
        config.worker.version = version;
    }
    if let Some(raw) = lookup(env_vars::FIRST_TIME_TIMEOUT) {
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => config.worker.first_time_timeout_ms = ms,
            _ => warn!("Ignoring {}={:?}", env_vars::FIRST_TIME_TIMEOUT, raw),
        }
    }
    if let Some(raw) = lookup(env_vars::RETURNING_USER_TIMEOUT) {
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => config.worker.returning_user_timeout_ms = ms,
            _ => warn!("Ignoring {}={:?}", env_vars::RETURNING_USER_TIMEOUT, raw),
        }
    }
    if let Some(raw) = lookup(env_vars::ENABLE_LOGS) {
        config.worker.enable_logs = raw != "false";
    }
}
