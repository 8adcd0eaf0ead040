//! The pluggable key-value persistence contract for memory entries and
//! the default transient implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use murmur_core::error::{MemoryError, MemoryResult};

use crate::entry::MemoryEntry;

/// Key-value persistence contract for memory entries.
///
/// The engine mounts two instances, one per tier. Backends must keep
/// operations on a single instance serialized internally; the engine
/// never assumes cross-store atomicity.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch an entry by id.
    async fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>>;

    /// Fetch every entry currently held.
    async fn get_all(&self) -> MemoryResult<Vec<MemoryEntry>>;

    /// Insert or replace an entry keyed by its id.
    async fn set(&self, entry: MemoryEntry) -> MemoryResult<()>;

    /// Remove an entry, reporting whether it existed.
    async fn delete(&self, id: &str) -> MemoryResult<bool>;

    /// Remove every entry.
    async fn clear(&self) -> MemoryResult<()>;

    /// Number of entries currently held.
    async fn size(&self) -> MemoryResult<usize>;
}

/// Fast, transient store backed by a `HashMap`.
///
/// All data is lost when the process terminates; pair with the engine's
/// snapshot persistence or use [`FileStore`](crate::FileStore) when
/// durability matters.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(reason: impl std::fmt::Display) -> MemoryError {
    MemoryError::Store {
        reason: format!("lock poisoned: {}", reason),
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(id).cloned())
    }

    async fn get_all(&self) -> MemoryResult<Vec<MemoryEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.values().cloned().collect())
    }

    async fn set(&self, entry: MemoryEntry) -> MemoryResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> MemoryResult<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(id).is_some())
    }

    async fn clear(&self) -> MemoryResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.clear();
        Ok(())
    }

    async fn size(&self) -> MemoryResult<usize> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.len())
    }
}
