//! Worker lifecycle and event entry points
//!
//! One `Worker` per deployment. Its lifecycle events (install, activate),
//! intercepted fetches, and client messages are plain async methods; the
//! host runtime decides when to call them.

use crate::arbiter::{FetchArbiter, Resolution};
use crate::clients::ClientHub;
use crate::context::WorkerContext;
use crate::error::{OffcacheError, OffcacheResult};
use crate::install::{ActivationOutcome, InstallCoordinator, InstallReport};
use crate::network::{Network, Request};
use crate::store::CacheStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting for activation
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

/// Client-to-worker message: `{"type": "SKIP_WAITING"}` or `{"type": "CACHE_INFO"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(rename = "CACHE_INFO")]
    CacheInfo,
}

impl ClientMessage {
    /// Decode a JSON message
    pub fn parse(raw: &str) -> OffcacheResult<Self> {
        serde_json::from_str(raw).map_err(|_| OffcacheError::UnknownMessage(raw.to_string()))
    }
}

/// Reply to `CACHE_INFO`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub cache_size: usize,
    pub cached_urls: Vec<String>,
}

/// What the worker does with an intercepted request
#[derive(Debug)]
pub enum Disposition {
    /// Answered by the arbiter
    Respond(Resolution),
    /// Not same-origin; the caller should use the network directly
    Passthrough,
}

/// A deployed worker instance
pub struct Worker {
    ctx: Arc<WorkerContext>,
    store: Arc<dyn CacheStore>,
    coordinator: InstallCoordinator,
    arbiter: FetchArbiter,
    state: Mutex<WorkerState>,
    /// `SKIP_WAITING` arrived before install finished
    skip_requested: AtomicBool,
    last_activation: Mutex<Option<ActivationOutcome>>,
}

impl Worker {
    pub fn new(
        ctx: Arc<WorkerContext>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientHub>,
    ) -> Self {
        let coordinator = InstallCoordinator::new(
            Arc::clone(&ctx),
            Arc::clone(&store),
            Arc::clone(&network),
            clients,
        );
        let arbiter = FetchArbiter::new(Arc::clone(&ctx), Arc::clone(&store), network);

        Self {
            ctx,
            store,
            coordinator,
            arbiter,
            state: Mutex::new(WorkerState::Parsed),
            skip_requested: AtomicBool::new(false),
            last_activation: Mutex::new(None),
        }
    }

    /// Deployment context
    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move `from` -> `to`; false if the worker was not in `from`
    fn transition(&self, from: &[WorkerState], to: WorkerState) -> bool {
        let mut state = self.lock_state();
        if from.contains(&*state) {
            debug!("Worker {} -> {}", *state, to);
            *state = to;
            true
        } else {
            false
        }
    }

    /// Install event: stage every manifest asset
    pub async fn install(&self) -> OffcacheResult<InstallReport> {
        self.install_with_progress(&|_| {}).await
    }

    /// Install event with per-asset progress
    pub async fn install_with_progress(
        &self,
        on_asset: &(dyn Fn(&crate::install::AssetResult) + Send + Sync),
    ) -> OffcacheResult<InstallReport> {
        if !self.transition(&[WorkerState::Parsed], WorkerState::Installing) {
            return Err(OffcacheError::WorkerState {
                action: "install".to_string(),
                state: self.state().to_string(),
            });
        }
        if self.ctx.enable_logs {
            info!("Installing {}", self.ctx.names);
        }

        let report = self.coordinator.install_with_progress(on_asset).await;
        self.transition(&[WorkerState::Installing], WorkerState::Installed);

        if self.skip_requested.swap(false, Ordering::SeqCst) {
            debug!("Honoring SKIP_WAITING received during install");
            self.activate().await?;
        }
        Ok(report)
    }

    /// Treat a staging generation left by an earlier process as this
    /// worker's install, so it waits for `SKIP_WAITING` in `Installed`.
    ///
    /// Returns false when nothing is staged or the worker already moved on.
    pub async fn adopt_staging(&self) -> OffcacheResult<bool> {
        if self.store.is_empty(self.ctx.names.staging()).await? {
            return Ok(false);
        }
        let adopted = self.transition(&[WorkerState::Parsed], WorkerState::Installed);
        if adopted && self.ctx.enable_logs {
            info!("Adopted staged generation {}", self.ctx.names.staging());
        }
        Ok(adopted)
    }

    /// Activate event: promote or discard staging
    pub async fn activate(&self) -> OffcacheResult<ActivationOutcome> {
        if !self.transition(&[WorkerState::Installed], WorkerState::Activating) {
            return Err(OffcacheError::WorkerState {
                action: "activate".to_string(),
                state: self.state().to_string(),
            });
        }
        if self.ctx.enable_logs {
            info!("Activating {}", self.ctx.names);
        }

        let outcome = self.coordinator.activate().await;
        self.transition(&[WorkerState::Activating], WorkerState::Activated);
        *self
            .last_activation
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
        Ok(outcome)
    }

    /// Outcome of this worker's activation, once it happened
    pub fn last_activation(&self) -> Option<ActivationOutcome> {
        self.last_activation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Install, then activate right away when configured to skip waiting
    pub async fn start(&self) -> OffcacheResult<(InstallReport, Option<ActivationOutcome>)> {
        let report = self.install().await?;
        let outcome = if self.ctx.skip_waiting && self.state() == WorkerState::Installed {
            Some(self.activate().await?)
        } else {
            self.last_activation()
        };
        Ok((report, outcome))
    }

    /// Fetch event for a URL (absolute or origin-relative)
    pub async fn fetch(&self, request: &Request) -> Disposition {
        let Some(identifier) = self.ctx.identifier_for(&request.url) else {
            debug!("Passing through foreign request: {}", request.url);
            return Disposition::Passthrough;
        };

        let request = Request {
            url: identifier,
            ..request.clone()
        };
        Disposition::Respond(self.arbiter.handle(&request).await)
    }

    /// Wait for background cache refreshes started by `fetch`
    pub async fn settle(&self) {
        self.arbiter.settle().await;
    }

    /// Message event. `CACHE_INFO` answers on `port`.
    pub async fn on_message(
        &self,
        message: ClientMessage,
        port: Option<oneshot::Sender<CacheInfo>>,
    ) -> OffcacheResult<()> {
        match message {
            ClientMessage::SkipWaiting => {
                let state = {
                    let state = self.lock_state();
                    if matches!(*state, WorkerState::Parsed | WorkerState::Installing) {
                        // Checked by install once it reaches Installed
                        self.skip_requested.store(true, Ordering::SeqCst);
                    }
                    *state
                };
                match state {
                    WorkerState::Installed => match self.activate().await {
                        // Another SKIP_WAITING won the race
                        Err(OffcacheError::WorkerState { state, .. }) => {
                            debug!("SKIP_WAITING ignored in state {}", state);
                        }
                        result => {
                            result?;
                        }
                    },
                    WorkerState::Parsed | WorkerState::Installing => {
                        debug!("SKIP_WAITING deferred until install finishes");
                    }
                    WorkerState::Activating | WorkerState::Activated => {
                        debug!("SKIP_WAITING ignored in state {}", state);
                    }
                }
                Ok(())
            }
            ClientMessage::CacheInfo => {
                let port = port.ok_or_else(|| {
                    OffcacheError::User("CACHE_INFO requires a reply port".to_string())
                })?;
                let info = self.cache_info().await?;
                if port.send(info).is_err() {
                    warn!("CACHE_INFO requester went away");
                }
                Ok(())
            }
        }
    }

    /// Size and URLs of the live generation
    pub async fn cache_info(&self) -> OffcacheResult<CacheInfo> {
        let keys = self.store.keys(self.ctx.names.live()).await?;
        let mut cached_urls: Vec<String> = keys
            .into_iter()
            .map(|k| format!("{}{}", self.ctx.origin, k))
            .collect();
        cached_urls.sort();

        Ok(CacheInfo {
            cache_size: cached_urls.len(),
            cached_urls,
        })
    }
}
