//! Connected clients
//!
//! Pages controlled by the worker. After a promotion the worker broadcasts
//! a reload notice and claims every registered client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Buffered notices per subscriber before old ones are dropped
const NOTICE_CAPACITY: usize = 16;

/// Action a client should take on a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeAction {
    Reload,
}

/// Worker-to-client broadcast: `{"action": "reload", "message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerNotice {
    pub action: NoticeAction,
    pub message: String,
}

impl WorkerNotice {
    /// Reload notice sent after a successful promotion
    pub fn reload(message: impl Into<String>) -> Self {
        Self {
            action: NoticeAction::Reload,
            message: message.into(),
        }
    }
}

/// Where the worker sends notices and control claims
#[async_trait]
pub trait ClientHub: Send + Sync {
    /// Deliver a notice to every open client; returns the number reached
    async fn broadcast(&self, notice: &WorkerNotice) -> usize;

    /// Take control of every in-scope client; returns the number claimed
    async fn claim(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct ClientEntry {
    controlled: bool,
}

/// A registered client's end of the notice channel
pub struct ClientHandle {
    pub id: Uuid,
    receiver: broadcast::Receiver<WorkerNotice>,
}

impl ClientHandle {
    /// Next notice, if one is waiting
    pub fn try_recv(&mut self) -> Option<WorkerNotice> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next notice
    pub async fn recv(&mut self) -> Option<WorkerNotice> {
        self.receiver.recv().await.ok()
    }
}

/// In-process client registry
pub struct ClientRegistry {
    sender: broadcast::Sender<WorkerNotice>,
    clients: Mutex<HashMap<Uuid, ClientEntry>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            sender,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new, uncontrolled client
    pub fn register(&self) -> ClientHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id, ClientEntry { controlled: false });
        debug!("Client registered: {}", id);
        ClientHandle {
            id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Forget a client (page closed)
    pub fn unregister(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Whether a client is controlled by this worker
    pub fn is_controlled(&self, id: &Uuid) -> bool {
        self.lock().get(id).is_some_and(|c| c.controlled)
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no clients are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ClientEntry>> {
        // A poisoned map is still structurally valid
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientHub for ClientRegistry {
    async fn broadcast(&self, notice: &WorkerNotice) -> usize {
        self.sender.send(notice.clone()).unwrap_or(0)
    }

    async fn claim(&self) -> usize {
        let mut clients = self.lock();
        for entry in clients.values_mut() {
            entry.controlled = true;
        }
        clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_wire_format() {
        let notice = WorkerNotice::reload("App updated - all assets ready");
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["action"], "reload");
        assert_eq!(json["message"], "App updated - all assets ready");
    }

    #[tokio::test]
    async fn broadcast_reaches_registered_clients() {
        let registry = ClientRegistry::new();
        let mut a = registry.register();
        let mut b = registry.register();

        let reached = registry.broadcast(&WorkerNotice::reload("go")).await;

        assert_eq!(reached, 2);
        assert_eq!(a.try_recv().unwrap().action, NoticeAction::Reload);
        assert_eq!(b.recv().await.unwrap().message, "go");
    }

    #[tokio::test]
    async fn broadcast_without_clients_is_harmless() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.broadcast(&WorkerNotice::reload("x")).await, 0);
    }

    #[tokio::test]
    async fn claim_controls_everyone() {
        let registry = ClientRegistry::new();
        let a = registry.register();
        assert!(!registry.is_controlled(&a.id));

        assert_eq!(registry.claim().await, 1);
        assert!(registry.is_controlled(&a.id));

        assert!(registry.unregister(&a.id));
        assert!(registry.is_empty());
    }
}
