//! CLI command implementations

pub mod config;
pub mod fetch;
pub mod info;
pub mod inject;
pub mod install;
pub mod message;

pub use config::execute as config;
pub use fetch::execute as fetch;
pub use info::execute as info;
pub use inject::execute as inject;
pub use install::execute as install;
pub use message::execute as message;

use crate::clients::{ClientHub, ClientRegistry};
use crate::config::{Config, ConfigManager};
use crate::context::WorkerContext;
use crate::error::OffcacheResult;
use crate::network::{HttpNetwork, Network};
use crate::store::{CacheStore, DiskStore};
use crate::worker::Worker;
use std::sync::Arc;
use tracing::debug;

/// A worker wired to the on-disk store and the configured origin
pub(crate) struct Deployment {
    pub worker: Worker,
    pub store: Arc<DiskStore>,
    pub network: Arc<HttpNetwork>,
    pub clients: Arc<ClientRegistry>,
}

impl Deployment {
    /// Build a deployment from `config`, with an optional origin override
    pub(crate) async fn open(config: &Config, origin: Option<&str>) -> OffcacheResult<Self> {
        let mut config = config.clone();
        if let Some(origin) = origin {
            config.worker.origin = origin.to_string();
        }

        let ctx = Arc::new(WorkerContext::from_config(&config)?);
        let store = Arc::new(DiskStore::open_at(ConfigManager::store_dir(&config)).await?);
        let network = Arc::new(HttpNetwork::new(
            ctx.origin.clone(),
            ctx.first_time_timeout,
        ));
        let clients = Arc::new(ClientRegistry::new());

        debug!(
            "Deployment {} on {} backend at {}",
            ctx.names,
            store.backend_name(),
            store.root().display()
        );

        let worker = Worker::new(
            ctx,
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::clone(&network) as Arc<dyn Network>,
            Arc::clone(&clients) as Arc<dyn ClientHub>,
        );

        Ok(Self {
            worker,
            store,
            network,
            clients,
        })
    }
}
