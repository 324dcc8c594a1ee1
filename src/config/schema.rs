//! Configuration schema for offcache
//!
//! Configuration is stored at `~/.config/offcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker deployment settings
    pub worker: WorkerConfig,

    /// Critical asset list
    pub manifest: ManifestConfig,

    /// Cache store settings
    pub store: StoreConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Worker settings stamped in at deploy time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Application name, the prefix of every generation name
    pub app_name: String,

    /// Deployment version tag
    pub version: String,

    /// Origin serving the assets
    pub origin: String,

    /// Network timeout when the live generation is empty
    pub first_time_timeout_ms: u64,

    /// Network timeout when a live generation exists
    pub returning_user_timeout_ms: u64,

    /// Emit informational worker logs
    pub enable_logs: bool,

    /// Activate as soon as install finishes
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: "zmeya".to_string(),
            version: "v2".to_string(),
            origin: "http://localhost:3000".to_string(),
            first_time_timeout_ms: 20_000,
            returning_user_timeout_ms: 5_000,
            enable_logs: true,
            skip_waiting: true,
        }
    }
}

/// Manifest of critical assets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Asset paths that must all be present for a generation to be valid
    pub assets: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            assets: [
                "/",
                "/index.html",
                "/main.js",
                "/styles.js",
                "/manifest.json",
                "/icon-512.png",
                "/icon-192.png",
                "/favicon.ico",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for generations (default: state dir)
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[worker]"));
        assert!(toml.contains("[manifest]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.worker.app_name, "zmeya");
        assert_eq!(config.manifest.assets.len(), 8);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [worker]
            version = "v7"
            returning_user_timeout_ms = 3000
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.worker.version, "v7");
        assert_eq!(config.worker.returning_user_timeout_ms, 3000);
        assert_eq!(config.worker.first_time_timeout_ms, 20_000); // default preserved
    }
}
