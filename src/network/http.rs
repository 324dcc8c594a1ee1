//! HTTP origin client
//!
//! Uses a blocking `ureq` agent on the blocking thread pool. The caller's
//! deadline travels with the request and is enforced by the agent too, so
//! an abandoned attempt frees its thread instead of holding the runtime
//! open at shutdown.

use super::{Network, Request, Response};
use crate::error::{OffcacheError, OffcacheResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Network backed by real HTTP requests to one origin
pub struct HttpNetwork {
    agent: ureq::Agent,
    origin: String,
    online: AtomicBool,
}

impl HttpNetwork {
    /// Create a client for `origin` (e.g. `http://localhost:3000`).
    ///
    /// `default_timeout` bounds requests that carry no timeout of their own.
    pub fn new(origin: impl Into<String>, default_timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(default_timeout))
            .build()
            .into();

        Self {
            agent,
            origin: origin.into().trim_end_matches('/').to_string(),
            online: AtomicBool::new(true),
        }
    }

    /// Force the connectivity flag (e.g. `--offline`)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Absolute URL for a request
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn fetch(&self, request: &Request) -> OffcacheResult<Response> {
        if !self.is_online() {
            return Err(OffcacheError::Offline);
        }

        let url = self.resolve(&request.url);
        let agent = self.agent.clone();
        debug!("GET {}", url);

        let task_url = url.clone();
        let timeout = request.timeout;
        tokio::task::spawn_blocking(move || -> OffcacheResult<Response> {
            let mut builder = agent.get(&task_url);
            if let Some(timeout) = timeout {
                builder = builder.config().timeout_global(Some(timeout)).build();
            }
            let mut response = builder
                .call()
                .map_err(|e| OffcacheError::transport(&task_url, e.to_string()))?;

            let status = response.status();
            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response
                .body_mut()
                .read_to_vec()
                .map_err(|e| OffcacheError::transport(&task_url, e.to_string()))?;

            Ok(Response {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            })
        })
        .await
        .map_err(|e| OffcacheError::transport(&url, e.to_string()))?
    }
}
