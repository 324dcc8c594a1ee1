//! Fetch arbiter
//!
//! Per-request choice between the network and the live generation.
//! Callers with an empty live generation get a long network timeout and an
//! explicit error on failure; callers with a cache get a short timeout and
//! a cache fallback. Every path ends in a response.

use crate::context::WorkerContext;
use crate::network::{Network, Request, Response};
use crate::store::CacheStore;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Root document served for navigations that miss the cache
const ROOT_DOCUMENT: &str = "/";
const INDEX_DOCUMENT: &str = "/index.html";

/// How a request was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh network response
    NetworkSuccess,
    /// Network attempt timed out (first-time caller, 408)
    NetworkTimeout,
    /// Transport failure or error status surfaced to a first-time caller
    NetworkError,
    /// Exact match in the live generation
    CacheHit,
    /// Matched a fallback key (root document, query stripped)
    CacheFallback,
    /// Nothing matched (503)
    TotalFailure,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkSuccess => "network-success",
            Self::NetworkTimeout => "network-timeout",
            Self::NetworkError => "network-error",
            Self::CacheHit => "cache-hit",
            Self::CacheFallback => "cache-miss-fallback-used",
            Self::TotalFailure => "total-failure",
        };
        write!(f, "{}", name)
    }
}

/// Caller classification, derived from the live generation on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    FirstTime,
    Returning,
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstTime => write!(f, "first-time"),
            Self::Returning => write!(f, "returning"),
        }
    }
}

/// Response plus how it was obtained
#[derive(Debug, Clone)]
pub struct Resolution {
    pub response: Response,
    pub outcome: FetchOutcome,
    /// `None` when the runtime was offline and no classification happened
    pub caller: Option<Caller>,
}

impl Resolution {
    fn new(response: Response, outcome: FetchOutcome, caller: Option<Caller>) -> Self {
        Self {
            response,
            outcome,
            caller,
        }
    }
}

/// Keys tried against the live generation, in priority order
pub fn fallback_candidates(request: &Request) -> Vec<String> {
    let identifier = request.url.as_str();
    let mut candidates = vec![identifier.to_string()];

    if request.is_navigation() {
        candidates.push(ROOT_DOCUMENT.to_string());
        candidates.push(INDEX_DOCUMENT.to_string());
    }
    if let Some((path, _query)) = identifier.split_once('?') {
        candidates.push(path.to_string());
    }
    if identifier.ends_with('/') {
        candidates.push(INDEX_DOCUMENT.to_string());
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    candidates
}

/// Network-first request handling with adaptive timeouts
pub struct FetchArbiter {
    ctx: Arc<WorkerContext>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    refreshes: Mutex<Vec<JoinHandle<()>>>,
}

impl FetchArbiter {
    pub fn new(
        ctx: Arc<WorkerContext>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            ctx,
            store,
            network,
            refreshes: Mutex::new(Vec::new()),
        }
    }

    /// Answer one request. `request.url` is the origin-relative identifier.
    pub async fn handle(&self, request: &Request) -> Resolution {
        if !self.network.is_online() {
            if self.ctx.enable_logs {
                info!("No connectivity - serving from cache: {}", request.url);
            }
            return self.resolve_from_cache(request, None).await;
        }

        let caller = self.classify().await;
        let timeout = self.timeout_for(caller);
        debug!(
            "{:?} caller, network attempt for {} ({:?})",
            caller, request.url, timeout
        );

        let attempt = request.clone().with_timeout(timeout);
        match tokio::time::timeout(timeout, self.network.fetch(&attempt)).await {
            Ok(Ok(response)) if response.is_ok() => {
                if self.ctx.enable_logs {
                    info!("Network success for {} - caching response", request.url);
                }
                self.refresh(&request.url, &response);
                Resolution::new(response, FetchOutcome::NetworkSuccess, Some(caller))
            }
            Ok(Ok(response)) => match caller {
                Caller::FirstTime => {
                    error!(
                        "Server error {} for first-time caller: {}",
                        response.status, request.url
                    );
                    Resolution::new(response, FetchOutcome::NetworkError, Some(caller))
                }
                Caller::Returning => {
                    warn!(
                        "Server error {} - falling back to cache: {}",
                        response.status, request.url
                    );
                    self.resolve_from_cache(request, Some(caller)).await
                }
            },
            Ok(Err(e)) => match caller {
                Caller::FirstTime => {
                    error!("First-time network request failed: {}", e);
                    Resolution::new(
                        Response::request_timeout(),
                        FetchOutcome::NetworkError,
                        Some(caller),
                    )
                }
                Caller::Returning => {
                    error!("Network request failed - falling back to cache: {}", e);
                    self.resolve_from_cache(request, Some(caller)).await
                }
            },
            Err(_) => match caller {
                Caller::FirstTime => {
                    error!("First-time network request timed out: {}", request.url);
                    Resolution::new(
                        Response::request_timeout(),
                        FetchOutcome::NetworkTimeout,
                        Some(caller),
                    )
                }
                Caller::Returning => {
                    if self.ctx.enable_logs {
                        info!("Network timeout - falling back to cache: {}", request.url);
                    }
                    self.resolve_from_cache(request, Some(caller)).await
                }
            },
        }
    }

    /// First-time if the live generation holds no entries
    pub async fn classify(&self) -> Caller {
        match self.store.is_empty(self.ctx.names.live()).await {
            Ok(false) => Caller::Returning,
            Ok(true) => Caller::FirstTime,
            Err(e) => {
                warn!("Failed to read live generation, assuming first-time: {}", e);
                Caller::FirstTime
            }
        }
    }

    fn timeout_for(&self, caller: Caller) -> Duration {
        match caller {
            Caller::FirstTime => self.ctx.first_time_timeout,
            Caller::Returning => self.ctx.returning_user_timeout,
        }
    }

    /// Walk the fallback chain against the live generation, ending in 503
    pub async fn resolve_from_cache(&self, request: &Request, caller: Option<Caller>) -> Resolution {
        let live = self.ctx.names.live();

        for (i, key) in fallback_candidates(request).iter().enumerate() {
            match self.store.lookup(live, key).await {
                Ok(Some(response)) => {
                    let outcome = if i == 0 {
                        FetchOutcome::CacheHit
                    } else {
                        FetchOutcome::CacheFallback
                    };
                    debug!("Cache {} for {} via {}", outcome, request.url, key);
                    return Resolution::new(response, outcome, caller);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup failed for {}: {}", key, e),
            }
        }

        warn!("Nothing cached for {}", request.url);
        Resolution::new(
            Response::service_unavailable(),
            FetchOutcome::TotalFailure,
            caller,
        )
    }

    /// Write a fresh response into the live generation without blocking the caller
    fn refresh(&self, identifier: &str, response: &Response) {
        let store = Arc::clone(&self.store);
        let live = self.ctx.names.live().to_string();
        let identifier = identifier.to_string();
        let response = response.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = store.put(&live, &identifier, &response).await {
                warn!("Failed to refresh {} in {}: {}", identifier, live, e);
            }
        });

        let mut refreshes = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
        refreshes.retain(|h| !h.is_finished());
        refreshes.push(handle);
    }

    /// Wait for outstanding cache refreshes
    pub async fn settle(&self) {
        let pending: Vec<_> = {
            let mut refreshes = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
            refreshes.drain(..).collect()
        };
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Cache refresh task failed: {}", e);
            }
        }
    }
}
