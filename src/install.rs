//! Install coordinator
//!
//! Builds a staging generation from the manifest, then on activation
//! promotes it to live all-or-nothing and removes older generations.
//!
//! ```text
//! Idle -> Installing -> StagingComplete -> Activating -> Promoted
//!                    \-> StagingFailed  ->            \-> Aborted
//! ```
//!
//! `Promoted` and `Aborted` hold until the next install starts.

use crate::clients::{ClientHub, WorkerNotice};
use crate::context::WorkerContext;
use crate::error::{OffcacheError, OffcacheResult};
use crate::network::{Network, Request};
use crate::store::CacheStore;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Message sent to clients after a successful promotion
pub const RELOAD_MESSAGE: &str = "App updated - all assets ready";

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Idle,
    Installing,
    StagingComplete,
    StagingFailed,
    Activating,
    Promoted,
    Aborted,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Installing => "installing",
            Self::StagingComplete => "staging-complete",
            Self::StagingFailed => "staging-failed",
            Self::Activating => "activating",
            Self::Promoted => "promoted",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Result of fetching one manifest asset during install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetResult {
    Staged { identifier: String },
    Failed { identifier: String, reason: String },
}

impl AssetResult {
    pub fn identifier(&self) -> &str {
        match self {
            Self::Staged { identifier } | Self::Failed { identifier, .. } => identifier,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }
}

/// Summary of an install phase
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Per-asset results in manifest order
    pub assets: Vec<AssetResult>,
    /// `StagingComplete` or `StagingFailed`
    pub phase: InstallPhase,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.phase == InstallPhase::StagingComplete
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssetResult> {
        self.assets.iter().filter(|a| !a.is_staged())
    }

    /// `Err` describing the failures when staging is incomplete
    pub fn ensure_complete(&self) -> OffcacheResult<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(OffcacheError::User(format!(
            "{} of {} assets failed to stage",
            self.failures().count(),
            self.assets.len()
        )))
    }
}

/// Result of an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Staging copied into live and old generations removed
    Promoted {
        entries: usize,
        removed: Vec<String>,
        notified: usize,
        claimed: usize,
    },
    /// Staging incomplete; live left untouched
    Aborted {
        expected: usize,
        staged: usize,
        missing: Vec<String>,
    },
}

impl ActivationOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted { .. })
    }
}

/// Populates, promotes and garbage-collects generations
pub struct InstallCoordinator {
    ctx: Arc<WorkerContext>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientHub>,
    phase: Mutex<InstallPhase>,
    // Serializes install/activate so repeated activation requests cannot interleave
    lifecycle: tokio::sync::Mutex<()>,
}

impl InstallCoordinator {
    pub fn new(
        ctx: Arc<WorkerContext>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientHub>,
    ) -> Self {
        Self {
            ctx,
            store,
            network,
            clients,
            phase: Mutex::new(InstallPhase::Idle),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Current phase
    pub fn phase(&self) -> InstallPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: InstallPhase) {
        debug!("Install phase -> {}", phase);
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Populate the staging generation
    pub async fn install(&self) -> InstallReport {
        self.install_with_progress(&|_| {}).await
    }

    /// Populate the staging generation, reporting each asset as it settles.
    ///
    /// Every manifest asset is attempted; a failure never stops the others.
    pub async fn install_with_progress(
        &self,
        on_asset: &(dyn Fn(&AssetResult) + Send + Sync),
    ) -> InstallReport {
        let _lifecycle = self.lifecycle.lock().await;
        self.set_phase(InstallPhase::Installing);

        let staging = self.ctx.names.staging();
        if self.ctx.enable_logs {
            info!(
                "Installing {} assets into {}",
                self.ctx.manifest.len(),
                staging
            );
        }

        // Staging starts empty for every install
        let prepared = match self.store.delete(staging).await {
            Ok(_) => self.store.open(staging).await,
            Err(e) => Err(e),
        };
        if let Err(e) = prepared {
            error!("Failed to prepare staging generation {}: {}", staging, e);
            let assets = self
                .ctx
                .manifest
                .iter()
                .map(|id| AssetResult::Failed {
                    identifier: id.to_string(),
                    reason: e.to_string(),
                })
                .collect();
            self.set_phase(InstallPhase::StagingFailed);
            return InstallReport {
                assets,
                phase: InstallPhase::StagingFailed,
            };
        }

        let assets = join_all(self.ctx.manifest.iter().map(|identifier| async move {
            let result = self.stage_asset(identifier).await;
            on_asset(&result);
            result
        }))
        .await;

        let phase = match self.store.keys(staging).await {
            Ok(keys) if self.ctx.manifest.is_satisfied_by(&keys) => InstallPhase::StagingComplete,
            Ok(keys) => {
                warn!(
                    "Incomplete staging - expected {}, got {}",
                    self.ctx.manifest.len(),
                    keys.len()
                );
                InstallPhase::StagingFailed
            }
            Err(e) => {
                error!("Failed to read staging generation: {}", e);
                InstallPhase::StagingFailed
            }
        };

        self.set_phase(phase);
        InstallReport { assets, phase }
    }

    async fn stage_asset(&self, identifier: &str) -> AssetResult {
        let failed = |reason: String| {
            error!("Failed to cache {}: {}", identifier, reason);
            AssetResult::Failed {
                identifier: identifier.to_string(),
                reason,
            }
        };

        let request = Request::get(identifier).with_timeout(self.ctx.first_time_timeout);
        let response = match tokio::time::timeout(
            self.ctx.first_time_timeout,
            self.network.fetch(&request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return failed(e.to_string()),
            Err(_) => return failed("network timeout".to_string()),
        };

        if !response.is_ok() {
            return failed(format!("status {}", response.status));
        }

        match self
            .store
            .put(self.ctx.names.staging(), identifier, &response)
            .await
        {
            Ok(()) => {
                if self.ctx.enable_logs {
                    info!("Cached {}", identifier);
                }
                AssetResult::Staged {
                    identifier: identifier.to_string(),
                }
            }
            Err(e) => failed(e.to_string()),
        }
    }

    /// Promote staging to live if complete; otherwise discard staging
    pub async fn activate(&self) -> ActivationOutcome {
        let _lifecycle = self.lifecycle.lock().await;
        self.set_phase(InstallPhase::Activating);

        let staging = self.ctx.names.staging();
        let live = self.ctx.names.live();

        let keys = match self.store.keys(staging).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Failed to read staging generation: {}", e);
                HashSet::new()
            }
        };

        let outcome = if self.ctx.manifest.is_satisfied_by(&keys) {
            if self.ctx.enable_logs {
                info!("All assets staged, updating live generation {}", live);
            }
            match self.store.promote(staging, live).await {
                Ok(entries) => self.finish_promotion(entries).await,
                Err(e) => {
                    error!("Promotion of {} failed, keeping old generation: {}", staging, e);
                    self.discard_staging().await;
                    ActivationOutcome::Aborted {
                        expected: self.ctx.manifest.len(),
                        staged: keys.len(),
                        missing: vec![],
                    }
                }
            }
        } else {
            let missing: Vec<String> = self
                .ctx
                .manifest
                .missing_from(&keys)
                .into_iter()
                .map(str::to_string)
                .collect();
            error!(
                "Incomplete staging - expected {}, got {}. Keeping old generation.",
                self.ctx.manifest.len(),
                keys.len()
            );
            self.discard_staging().await;
            ActivationOutcome::Aborted {
                expected: self.ctx.manifest.len(),
                staged: keys.len(),
                missing,
            }
        };

        let claimed = self.clients.claim().await;
        debug!("Claimed {} clients", claimed);

        self.set_phase(if outcome.is_promoted() {
            InstallPhase::Promoted
        } else {
            InstallPhase::Aborted
        });

        match outcome {
            ActivationOutcome::Promoted {
                entries,
                removed,
                notified,
                ..
            } => ActivationOutcome::Promoted {
                entries,
                removed,
                notified,
                claimed,
            },
            aborted => aborted,
        }
    }

    async fn finish_promotion(&self, entries: usize) -> ActivationOutcome {
        self.discard_staging().await;
        let removed = self.collect_stale().await;

        let notified = self
            .clients
            .broadcast(&WorkerNotice::reload(RELOAD_MESSAGE))
            .await;

        if self.ctx.enable_logs {
            info!("Generation replacement completed ({} entries)", entries);
        }
        ActivationOutcome::Promoted {
            entries,
            removed,
            notified,
            claimed: 0,
        }
    }

    async fn discard_staging(&self) {
        if let Err(e) = self.store.delete(self.ctx.names.staging()).await {
            warn!("Failed to delete staging generation: {}", e);
        }
    }

    /// Delete every generation of this app other than live and staging
    async fn collect_stale(&self) -> Vec<String> {
        let names = match self.store.generation_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list generations: {}", e);
                return vec![];
            }
        };

        let mut stale = self.ctx.names.stale(&names);
        stale.sort();
        if self.ctx.enable_logs {
            info!("Deleting {} old generations: {:?}", stale.len(), stale);
        }

        let results = join_all(stale.iter().map(|name| self.store.delete(name))).await;
        stale
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(_) => Some(name),
                Err(e) => {
                    warn!("Failed to delete {}: {}", name, e);
                    None
                }
            })
            .collect()
    }
}
