//! Worker context
//!
//! Built once from the loaded configuration and passed to every component,
//! so the coordinator and arbiter can be constructed with fake stores,
//! networks and clocks in tests.

use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::generation::GenerationNames;
use crate::manifest::AssetManifest;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable per-deployment settings
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub names: GenerationNames,
    pub manifest: AssetManifest,
    pub origin: String,
    pub version: String,
    pub first_time_timeout: Duration,
    pub returning_user_timeout: Duration,
    pub enable_logs: bool,
    pub skip_waiting: bool,
}

impl WorkerContext {
    /// Validate a configuration and build the context from it
    pub fn from_config(config: &Config) -> OffcacheResult<Self> {
        let invalid = |reason: String| OffcacheError::ConfigInvalid {
            path: PathBuf::from("config.toml"),
            reason,
        };

        let worker = &config.worker;
        if worker.first_time_timeout_ms == 0 || worker.returning_user_timeout_ms == 0 {
            return Err(invalid("timeouts must be greater than zero".to_string()));
        }
        if !worker.origin.starts_with("http://") && !worker.origin.starts_with("https://") {
            return Err(invalid(format!("origin must be an http(s) URL: {}", worker.origin)));
        }

        let names = GenerationNames::new(&worker.app_name, &worker.version)
            .map_err(|e| invalid(e.to_string()))?;
        let manifest = AssetManifest::new(config.manifest.assets.iter().cloned())?;

        Ok(Self {
            names,
            manifest,
            origin: worker.origin.trim_end_matches('/').to_string(),
            version: worker.version.clone(),
            first_time_timeout: Duration::from_millis(worker.first_time_timeout_ms),
            returning_user_timeout: Duration::from_millis(worker.returning_user_timeout_ms),
            enable_logs: worker.enable_logs,
            skip_waiting: worker.skip_waiting,
        })
    }

    /// Origin-relative identifier for a URL, or `None` for foreign origins
    pub fn identifier_for(&self, url: &str) -> Option<String> {
        if url.starts_with('/') {
            return Some(url.to_string());
        }
        let rest = url.strip_prefix(&self.origin)?;
        if rest.is_empty() {
            Some("/".to_string())
        } else if rest.starts_with('/') {
            Some(rest.to_string())
        } else if rest.starts_with('?') {
            Some(format!("/{rest}"))
        } else {
            // e.g. origin "http://a.com" vs url "http://a.com.evil"
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let ctx = WorkerContext::from_config(&Config::default()).unwrap();
        assert_eq!(ctx.names.live(), "zmeya-v2");
        assert_eq!(ctx.first_time_timeout, Duration::from_secs(20));
        assert_eq!(ctx.returning_user_timeout, Duration::from_secs(5));
        assert_eq!(ctx.manifest.len(), 8);
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.worker.returning_user_timeout_ms = 0;
        assert!(WorkerContext::from_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_manifest() {
        let mut config = Config::default();
        config.manifest.assets.clear();
        let err = WorkerContext::from_config(&config).unwrap_err();
        assert!(matches!(err, OffcacheError::ManifestEmpty));
    }

    #[test]
    fn identifiers_are_origin_relative() {
        let ctx = WorkerContext::from_config(&Config::default()).unwrap();
        assert_eq!(ctx.identifier_for("/main.js").as_deref(), Some("/main.js"));
        assert_eq!(
            ctx.identifier_for("http://localhost:3000/main.js?v=2").as_deref(),
            Some("/main.js?v=2")
        );
        assert_eq!(ctx.identifier_for("http://localhost:3000").as_deref(), Some("/"));
        assert_eq!(ctx.identifier_for("http://localhost:30001/x"), None);
        assert_eq!(ctx.identifier_for("https://analytics.example.com/t.js"), None);
    }
}
