//! Error types for offcache
//!
//! All modules use `OffcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for offcache operations
pub type OffcacheResult<T> = Result<T, OffcacheError>;

/// All errors that can occur in offcache
#[derive(Error, Debug)]
pub enum OffcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Asset manifest is empty")]
    ManifestEmpty,

    #[error("Invalid asset identifier: {0:?}")]
    ManifestEntry(String),

    // Store errors
    #[error("Invalid generation name: {0:?}")]
    GenerationName(String),

    #[error("Generation not found: {0}")]
    GenerationNotFound(String),

    #[error("Corrupt cache entry {path}: {reason}")]
    EntryCorrupt { path: PathBuf, reason: String },

    // Network errors
    #[error("Network request failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Network is offline")]
    Offline,

    // Worker protocol errors
    #[error("Unknown client message: {0}")]
    UnknownMessage(String),

    #[error("Worker is not ready for {action} (state: {state})")]
    WorkerState { action: String, state: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl OffcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error for a URL
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestEmpty => Some("Add asset paths under [manifest] assets in config.toml"),
            Self::Offline => Some("Drop --offline or check the origin is reachable"),
            Self::Transport { .. } => Some("Check [worker] origin in config.toml"),
            Self::ConfigInvalid { .. } => Some("Run: offcache config show"),
            _ => None,
        }
    }
}
