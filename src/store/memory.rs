//! In-memory cache store

use super::CacheStore;
use crate::error::{OffcacheError, OffcacheResult};
use crate::network::Response;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

type Generation = HashMap<String, Response>;

/// Cache store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    generations: RwLock<HashMap<String, Generation>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, generation: &str) -> OffcacheResult<()> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn put(
        &self,
        generation: &str,
        identifier: &str,
        response: &Response,
    ) -> OffcacheResult<()> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .insert(identifier.to_string(), response.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        generation: &str,
        identifier: &str,
    ) -> OffcacheResult<Option<Response>> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .and_then(|g| g.get(identifier))
            .cloned())
    }

    async fn keys(&self, generation: &str) -> OffcacheResult<HashSet<String>> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_empty(&self, generation: &str) -> OffcacheResult<bool> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .is_none_or(|g| g.is_empty()))
    }

    async fn delete(&self, generation: &str) -> OffcacheResult<bool> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }

    async fn generation_names(&self) -> OffcacheResult<HashSet<String>> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn promote(&self, from: &str, to: &str) -> OffcacheResult<usize> {
        let mut generations = self.generations.write().await;
        let staged = generations
            .get(from)
            .cloned()
            .ok_or_else(|| OffcacheError::GenerationNotFound(from.to_string()))?;
        let count = staged.len();
        generations.insert(to.to_string(), staged);
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_lookup_is_byte_equal() {
        let store = MemoryStore::new();
        let response = Response::new(200, b"\x00\x01game-data".to_vec())
            .with_header("Content-Type", "application/octet-stream");

        store.put("zmeya-v1", "/main.js", &response).await.unwrap();
        let found = store.lookup("zmeya-v1", "/main.js").await.unwrap().unwrap();

        assert_eq!(found, response);
    }

    #[tokio::test]
    async fn missing_generation_is_empty() {
        let store = MemoryStore::new();
        assert!(store.keys("nope").await.unwrap().is_empty());
        assert!(store.lookup("nope", "/").await.unwrap().is_none());
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn emptiness_tracks_entries() {
        let store = MemoryStore::new();
        assert!(store.is_empty("zmeya-v1").await.unwrap());
        store.open("zmeya-v1").await.unwrap();
        assert!(store.is_empty("zmeya-v1").await.unwrap());
        store.put("zmeya-v1", "/", &Response::new(200, vec![])).await.unwrap();
        assert!(!store.is_empty("zmeya-v1").await.unwrap());
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let store = MemoryStore::new();
        store.open("zmeya-v1").await.unwrap();
        store.put("zmeya-v1", "/", &Response::new(200, vec![])).await.unwrap();
        store.open("zmeya-v1").await.unwrap();

        assert_eq!(store.keys("zmeya-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryStore::new();
        store.put("g", "/a", &Response::new(200, b"old".to_vec())).await.unwrap();
        store.put("g", "/a", &Response::new(200, b"new".to_vec())).await.unwrap();

        let found = store.lookup("g", "/a").await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
    }

    #[tokio::test]
    async fn promote_replaces_target() {
        let store = MemoryStore::new();
        store.put("live", "/old", &Response::new(200, vec![])).await.unwrap();
        store.put("temp", "/new", &Response::new(200, vec![])).await.unwrap();

        let copied = store.promote("temp", "live").await.unwrap();

        assert_eq!(copied, 1);
        let keys = store.keys("live").await.unwrap();
        assert!(keys.contains("/new"));
        assert!(!keys.contains("/old"));
        // Source is left for the caller to delete
        assert!(store.generation_names().await.unwrap().contains("temp"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_see_partial_promotion() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        for id in ["/a", "/b"] {
            store.put("live", id, &Response::new(200, b"old".to_vec())).await.unwrap();
        }
        for id in ["/a", "/b", "/c"] {
            store.put("temp", id, &Response::new(200, b"new".to_vec())).await.unwrap();
        }

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let store = store.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut snapshots = vec![];
                while !done.load(Ordering::SeqCst) {
                    let generations = store.generations.read().await;
                    let bodies: Vec<Vec<u8>> = generations["live"]
                        .values()
                        .map(|r| r.body.clone())
                        .collect();
                    drop(generations);
                    snapshots.push(bodies);
                    tokio::task::yield_now().await;
                }
                snapshots
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.promote("temp", "live").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        done.store(true, Ordering::SeqCst);

        let snapshots = reader.await.unwrap();
        assert!(!snapshots.is_empty());
        for bodies in snapshots {
            let old = bodies.len() == 2 && bodies.iter().all(|b| b == b"old");
            let new = bodies.len() == 3 && bodies.iter().all(|b| b == b"new");
            assert!(old || new, "mixed generation observed: {:?}", bodies);
        }
    }

    #[tokio::test]
    async fn promote_missing_source_fails() {
        let store = MemoryStore::new();
        let err = store.promote("temp", "live").await.unwrap_err();
        assert!(matches!(err, OffcacheError::GenerationNotFound(_)));
    }
}
