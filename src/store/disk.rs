//! Durable on-disk cache store
//!
//! Layout: `<root>/<generation>/<sha256(identifier)>.json`, one file per
//! entry. Promotion builds the target in a scratch directory, moves the old
//! target aside, renames the scratch directory into place and only then
//! drops the old copy, all under the store's write lock. A crash at any
//! point leaves either the old or the new generation, which `open_at`
//! restores.

use super::CacheStore;
use crate::error::{OffcacheError, OffcacheResult};
use crate::network::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Prefix for scratch directories; never listed as a generation
const SCRATCH_PREFIX: &str = ".promote-";
/// Prefix for a target moved aside during promotion
const RETIRED_PREFIX: &str = ".retired-";

/// Entry as persisted on disk
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    identifier: String,
    status: u16,
    status_text: String,
    headers: BTreeMap<String, String>,
    /// Hex-encoded body
    body: String,
    cached_at: DateTime<Utc>,
}

impl StoredEntry {
    fn capture(identifier: &str, response: &Response) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: hex::encode(&response.body),
            cached_at: Utc::now(),
        }
    }

    fn into_response(self, path: &Path) -> OffcacheResult<Response> {
        let body = hex::decode(&self.body).map_err(|e| OffcacheError::EntryCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            body,
        })
    }
}

/// Cache store persisted under a root directory
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl DiskStore {
    /// Open a store rooted at `root`, creating the directory
    pub async fn open_at(root: impl Into<PathBuf>) -> OffcacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| OffcacheError::io(format!("creating store root {}", root.display()), e))?;
        let store = Self {
            root,
            lock: RwLock::new(()),
        };
        store.recover().await?;
        Ok(store)
    }

    /// Finish or roll back a promotion interrupted by a crash
    async fn recover(&self) -> OffcacheResult<()> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| OffcacheError::io(format!("reading store {}", self.root.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io("reading store entry", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            if name.starts_with(SCRATCH_PREFIX) {
                // Never renamed into place; the target still holds its old contents
                warn!("Removing unfinished promotion {}", path.display());
                Self::remove_dir_if_present(&path).await?;
            } else if let Some(generation) = name.strip_prefix(RETIRED_PREFIX) {
                let target = self.root.join(generation);
                if target.exists() {
                    debug!("Removing retired copy of {}", generation);
                    Self::remove_dir_if_present(&path).await?;
                } else {
                    warn!("Restoring {} from interrupted promotion", generation);
                    fs::rename(&path, &target).await.map_err(|e| {
                        OffcacheError::io(format!("restoring {}", target.display()), e)
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> OffcacheResult<PathBuf> {
        if generation.is_empty()
            || generation.starts_with('.')
            || generation.contains(['/', '\\'])
        {
            return Err(OffcacheError::GenerationName(generation.to_string()));
        }
        Ok(self.root.join(generation))
    }

    async fn write_entry(dir: &Path, identifier: &str, response: &Response) -> OffcacheResult<()> {
        let path = dir.join(entry_file_name(identifier));
        let content = serde_json::to_vec(&StoredEntry::capture(identifier, response))?;
        fs::write(&path, content)
            .await
            .map_err(|e| OffcacheError::io(format!("writing entry {}", path.display()), e))
    }

    async fn read_entry(path: &Path) -> OffcacheResult<StoredEntry> {
        let content = fs::read(path)
            .await
            .map_err(|e| OffcacheError::io(format!("reading entry {}", path.display()), e))?;
        serde_json::from_slice(&content).map_err(|e| OffcacheError::EntryCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn entry_paths(dir: &Path) -> OffcacheResult<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut paths = vec![];
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| OffcacheError::io(format!("reading generation {}", dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io("reading generation entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn remove_dir_if_present(dir: &Path) -> OffcacheResult<bool> {
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)
            .await
            .map_err(|e| OffcacheError::io(format!("removing {}", dir.display()), e))?;
        Ok(true)
    }
}

/// File name for an identifier's entry
fn entry_file_name(identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    format!("{}.json", hex::encode(hasher.finalize()))
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, generation: &str) -> OffcacheResult<()> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.read().await;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OffcacheError::io(format!("creating generation {}", dir.display()), e))
    }

    async fn put(
        &self,
        generation: &str,
        identifier: &str,
        response: &Response,
    ) -> OffcacheResult<()> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.read().await;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OffcacheError::io(format!("creating generation {}", dir.display()), e))?;
        Self::write_entry(&dir, identifier, response).await
    }

    async fn lookup(
        &self,
        generation: &str,
        identifier: &str,
    ) -> OffcacheResult<Option<Response>> {
        let path = self
            .generation_dir(generation)?
            .join(entry_file_name(identifier));
        let _guard = self.lock.read().await;

        if !path.exists() {
            return Ok(None);
        }
        let entry = Self::read_entry(&path).await?;
        entry.into_response(&path).map(Some)
    }

    async fn keys(&self, generation: &str) -> OffcacheResult<HashSet<String>> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.read().await;

        let mut keys = HashSet::new();
        for path in Self::entry_paths(&dir).await? {
            match Self::read_entry(&path).await {
                Ok(entry) => {
                    keys.insert(entry.identifier);
                }
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
        Ok(keys)
    }

    async fn is_empty(&self, generation: &str) -> OffcacheResult<bool> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.read().await;

        if !dir.exists() {
            return Ok(true);
        }
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| OffcacheError::io(format!("reading generation {}", dir.display()), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io("reading generation entry", e))?
        {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn delete(&self, generation: &str) -> OffcacheResult<bool> {
        let dir = self.generation_dir(generation)?;
        let _guard = self.lock.write().await;
        Self::remove_dir_if_present(&dir).await
    }

    async fn generation_names(&self) -> OffcacheResult<HashSet<String>> {
        let _guard = self.lock.read().await;

        let mut names = HashSet::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| OffcacheError::io(format!("reading store {}", self.root.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OffcacheError::io("reading store entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && !name.starts_with('.') {
                names.insert(name);
            }
        }
        Ok(names)
    }

    async fn promote(&self, from: &str, to: &str) -> OffcacheResult<usize> {
        let source = self.generation_dir(from)?;
        let target = self.generation_dir(to)?;
        let scratch = self.root.join(format!("{SCRATCH_PREFIX}{to}"));
        let retired = self.root.join(format!("{RETIRED_PREFIX}{to}"));

        let _guard = self.lock.write().await;

        if !source.exists() {
            return Err(OffcacheError::GenerationNotFound(from.to_string()));
        }

        Self::remove_dir_if_present(&scratch).await?;
        fs::create_dir_all(&scratch)
            .await
            .map_err(|e| OffcacheError::io(format!("creating {}", scratch.display()), e))?;

        let mut copied = 0;
        for path in Self::entry_paths(&source).await? {
            if let Some(file_name) = path.file_name() {
                fs::copy(&path, scratch.join(file_name)).await.map_err(|e| {
                    OffcacheError::io(format!("copying entry {}", path.display()), e)
                })?;
                copied += 1;
            }
        }

        Self::remove_dir_if_present(&retired).await?;
        let had_target = target.exists();
        if had_target {
            fs::rename(&target, &retired).await.map_err(|e| {
                OffcacheError::io(format!("moving {} aside", target.display()), e)
            })?;
        }

        if let Err(e) = fs::rename(&scratch, &target).await {
            if had_target {
                if let Err(restore) = fs::rename(&retired, &target).await {
                    warn!("Failed to restore {}: {}", target.display(), restore);
                }
            }
            let _ = Self::remove_dir_if_present(&scratch).await;
            return Err(OffcacheError::io(
                format!("renaming {} into place", scratch.display()),
                e,
            ));
        }

        if had_target {
            if let Err(e) = Self::remove_dir_if_present(&retired).await {
                // Swept by the next open_at
                warn!("Failed to remove retired {}: {}", retired.display(), e);
            }
        }

        debug!("Promoted {} entries from {} to {}", copied, from, to);
        Ok(copied)
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> DiskStore {
        DiskStore::open_at(dir.path().join("caches")).await.unwrap()
    }

    #[tokio::test]
    async fn roundtrip_preserves_body_and_headers() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let response = Response::new(200, vec![0xff, 0x00, 0x7f])
            .with_header("Content-Type", "image/png");

        store.put("zmeya-v1", "/icon-192.png", &response).await.unwrap();
        let found = store
            .lookup("zmeya-v1", "/icon-192.png")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found, response);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = store(&dir).await;
            store
                .put("zmeya-v1", "/main.js", &Response::new(200, b"game()".to_vec()))
                .await
                .unwrap();
        }

        let reopened = store(&dir).await;
        let keys = reopened.keys("zmeya-v1").await.unwrap();
        assert!(keys.contains("/main.js"));
    }

    #[tokio::test]
    async fn lists_and_deletes_generations() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.open("zmeya-v1").await.unwrap();
        store.open("otherapp-v1").await.unwrap();

        let names = store.generation_names().await.unwrap();
        assert_eq!(names.len(), 2);

        assert!(store.delete("zmeya-v1").await.unwrap());
        assert!(!store.delete("zmeya-v1").await.unwrap());
        let names = store.generation_names().await.unwrap();
        assert!(names.contains("otherapp-v1"));
        assert!(!names.contains("zmeya-v1"));
    }

    #[tokio::test]
    async fn promote_swaps_contents() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.put("zmeya-v2", "/stale.js", &Response::new(200, vec![])).await.unwrap();
        store.put("zmeya-temp-v2", "/", &Response::new(200, b"<html>".to_vec())).await.unwrap();
        store.put("zmeya-temp-v2", "/main.js", &Response::new(200, vec![])).await.unwrap();

        let copied = store.promote("zmeya-temp-v2", "zmeya-v2").await.unwrap();

        assert_eq!(copied, 2);
        let keys = store.keys("zmeya-v2").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys.contains("/stale.js"));
        // Scratch directory never shows up as a generation
        let names = store.generation_names().await.unwrap();
        assert!(names.iter().all(|n| !n.starts_with('.')));
    }

    #[tokio::test]
    async fn emptiness_does_not_parse_entries() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        assert!(store.is_empty("zmeya-v1").await.unwrap());
        store.open("zmeya-v1").await.unwrap();
        assert!(store.is_empty("zmeya-v1").await.unwrap());

        // Unparseable entry still counts; only the directory listing is read
        std::fs::write(dir.path().join("caches/zmeya-v1/garbage.json"), b"{not json").unwrap();
        assert!(!store.is_empty("zmeya-v1").await.unwrap());
    }

    #[tokio::test]
    async fn reopen_restores_generation_moved_aside() {
        let dir = TempDir::new().unwrap();
        {
            let store = store(&dir).await;
            store.put("zmeya-v1", "/main.js", &Response::new(200, b"v1".to_vec())).await.unwrap();
        }
        // Crash after the old live was moved aside, before the new one landed
        let root = dir.path().join("caches");
        std::fs::rename(root.join("zmeya-v1"), root.join(".retired-zmeya-v1")).unwrap();
        std::fs::create_dir_all(root.join(".promote-zmeya-v1")).unwrap();

        let reopened = store(&dir).await;

        let found = reopened.lookup("zmeya-v1", "/main.js").await.unwrap().unwrap();
        assert_eq!(found.body, b"v1");
        assert!(!root.join(".retired-zmeya-v1").exists());
        assert!(!root.join(".promote-zmeya-v1").exists());
    }

    #[tokio::test]
    async fn reopen_drops_retired_copy_once_promoted() {
        let dir = TempDir::new().unwrap();
        {
            let store = store(&dir).await;
            store.put("zmeya-v1", "/", &Response::new(200, b"new".to_vec())).await.unwrap();
        }
        let root = dir.path().join("caches");
        std::fs::create_dir_all(root.join(".retired-zmeya-v1")).unwrap();

        let reopened = store(&dir).await;

        assert!(!root.join(".retired-zmeya-v1").exists());
        let found = reopened.lookup("zmeya-v1", "/").await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
    }

    #[tokio::test]
    async fn failed_promote_keeps_live() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.put("zmeya-v2", "/", &Response::new(200, b"old".to_vec())).await.unwrap();
        store.put("zmeya-temp-v2", "/", &Response::new(200, b"new".to_vec())).await.unwrap();
        // A plain file where the scratch directory must go
        std::fs::write(dir.path().join("caches/.promote-zmeya-v2"), b"").unwrap();

        assert!(store.promote("zmeya-temp-v2", "zmeya-v2").await.is_err());

        let live = store.lookup("zmeya-v2", "/").await.unwrap().unwrap();
        assert_eq!(live.body, b"old");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_see_partial_promotion() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store(&dir).await);
        let old: HashSet<String> = ["/a", "/b"].iter().map(|s| s.to_string()).collect();
        let new: HashSet<String> = ["/c", "/d", "/e"].iter().map(|s| s.to_string()).collect();
        for id in &old {
            store.put("zmeya-v2", id, &Response::new(200, b"old".to_vec())).await.unwrap();
        }
        for id in &new {
            store.put("zmeya-temp-v2", id, &Response::new(200, b"new".to_vec())).await.unwrap();
        }

        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader = {
            let store = store.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut seen = vec![];
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    seen.push(store.keys("zmeya-v2").await.unwrap());
                    tokio::task::yield_now().await;
                }
                seen
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.promote("zmeya-temp-v2", "zmeya-v2").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        done.store(true, std::sync::atomic::Ordering::SeqCst);

        let seen = reader.await.unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|keys| *keys == old || *keys == new));
        assert_eq!(store.keys("zmeya-v2").await.unwrap(), new);
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        assert!(store.open("../escape").await.is_err());
        assert!(store.open(".hidden").await.is_err());
    }

    #[test]
    fn entry_names_are_stable() {
        assert_eq!(entry_file_name("/"), entry_file_name("/"));
        assert_ne!(entry_file_name("/"), entry_file_name("/index.html"));
        assert!(entry_file_name("/main.js").ends_with(".json"));
    }
}
