//! Generational cache store
//!
//! Maps resource identifiers to captured responses, grouped into named
//! generations. A deployment writes into a staging generation during
//! install and promotes it into the live generation on activation.
//!
//! # Generations
//!
//! | Name | Writer | Lifetime |
//! |------|--------|----------|
//! | `<app>-temp-<version>` | install | removed after every activation |
//! | `<app>-<version>` | activation, fetch refresh | durable until superseded |

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::error::OffcacheResult;
use crate::network::Response;
use async_trait::async_trait;
use std::collections::HashSet;

/// Abstract cache storage interface
///
/// Implementations must make `promote` a single step from the point of view
/// of concurrent readers: a lookup against the target generation sees either
/// the old contents or the new contents, never a mix.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist
    async fn open(&self, generation: &str) -> OffcacheResult<()>;

    /// Store a snapshot of `response` under `identifier`, overwriting silently
    async fn put(&self, generation: &str, identifier: &str, response: &Response)
        -> OffcacheResult<()>;

    /// Exact-key lookup
    async fn lookup(&self, generation: &str, identifier: &str)
        -> OffcacheResult<Option<Response>>;

    /// Identifiers stored in a generation (empty if it does not exist)
    async fn keys(&self, generation: &str) -> OffcacheResult<HashSet<String>>;

    /// Whether a generation holds no entries (true if it does not exist).
    ///
    /// Called on every intercepted request, so it must not read entries.
    async fn is_empty(&self, generation: &str) -> OffcacheResult<bool>;

    /// Remove a whole generation; returns whether it existed
    async fn delete(&self, generation: &str) -> OffcacheResult<bool>;

    /// Names of every generation in the store
    async fn generation_names(&self) -> OffcacheResult<HashSet<String>>;

    /// Replace the contents of `to` with a copy of `from`, atomically for readers.
    ///
    /// Returns the number of entries copied. `from` is left in place.
    async fn promote(&self, from: &str, to: &str) -> OffcacheResult<usize>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
