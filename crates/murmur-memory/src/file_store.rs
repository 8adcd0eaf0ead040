//! A persistent store that syncs every mutation to a JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use murmur_core::error::{MemoryError, MemoryResult};

use crate::entry::MemoryEntry;
use crate::store::MemoryStore;

/// File-backed [`MemoryStore`].
///
/// Keeps a full in-memory copy and rewrites the file on every mutation
/// via a temp-file-and-rename so a crash mid-write never leaves a
/// truncated snapshot. A corrupt file found at startup is backed up
/// beside the original and the store starts fresh.
///
/// Multiple instances pointing at the same path will clobber each other;
/// give each store its own file.
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, MemoryEntry>>,
}

impl FileStore {
    /// Open a store at `path`, loading existing data if available.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = Self::load_cache(&path).unwrap_or_default();
        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    fn load_cache(path: &PathBuf) -> Option<HashMap<String, MemoryEntry>> {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<HashMap<String, MemoryEntry>>(&contents) {
                Ok(cache) => {
                    tracing::debug!(path = ?path, entries = cache.len(), "Loaded file store");
                    Some(cache)
                }
                Err(e) => {
                    tracing::error!(
                        path = ?path,
                        error = %e,
                        "Failed to parse file store JSON, starting fresh"
                    );
                    if let Some(parent) = path.parent() {
                        let backup = parent.join(format!(
                            "{}.corrupted.{}",
                            path.file_name().unwrap_or_default().to_string_lossy(),
                            chrono::Utc::now().timestamp()
                        ));
                        let _ = fs::copy(path, backup);
                    }
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "File store not found, starting fresh");
                None
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read file store");
                None
            }
        }
    }

    fn persist(&self, cache: &HashMap<String, MemoryEntry>) -> MemoryResult<()> {
        let json =
            serde_json::to_string_pretty(cache).map_err(|e| MemoryError::Serialization {
                reason: e.to_string(),
            })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|e| MemoryError::Persistence {
            path: tmp_path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| MemoryError::Persistence {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn poisoned(reason: impl std::fmt::Display) -> MemoryError {
    MemoryError::Store {
        reason: format!("lock poisoned: {}", reason),
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    async fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let cache = self.cache.read().map_err(poisoned)?;
        Ok(cache.get(id).cloned())
    }

    async fn get_all(&self) -> MemoryResult<Vec<MemoryEntry>> {
        let cache = self.cache.read().map_err(poisoned)?;
        Ok(cache.values().cloned().collect())
    }

    async fn set(&self, entry: MemoryEntry) -> MemoryResult<()> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        cache.insert(entry.id.clone(), entry);
        self.persist(&cache)
    }

    async fn delete(&self, id: &str) -> MemoryResult<bool> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        let removed = cache.remove(id).is_some();
        if removed {
            self.persist(&cache)?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> MemoryResult<()> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        cache.clear();
        self.persist(&cache)
    }

    async fn size(&self) -> MemoryResult<usize> {
        let cache = self.cache.read().map_err(poisoned)?;
        Ok(cache.len())
    }
}
