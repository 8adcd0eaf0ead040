//! The memory engine: owns both tier stores, the embedder cache, and the
//! consolidation/pruning policies.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use murmur_core::config::MemoryConfig;
use murmur_core::error::{EmbeddingError, MemoryError, MemoryResult};
use murmur_core::event::{EventBus, MemoryEvent};

use crate::embedding::{Embedder, PlaceholderEmbedder, cosine_similarity};
use crate::entry::{EntryDraft, EntryKind, MemoryEntry};
use crate::retention::retention_score;
use crate::store::{InMemoryStore, MemoryStore};

/// Which tier currently owns an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Short,
    Long,
}

/// Attribute and time-range filters applied before similarity scoring.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Exact source match.
    pub source: Option<String>,
    /// Exact kind match.
    pub kind: Option<EntryKind>,
    /// Any overlap with the entry's tags counts as a match.
    pub tags: Vec<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
}

impl EntryFilter {
    /// Whether `entry` passes every configured predicate.
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if let Some(source) = &self.source
            && entry.metadata.source != *source
        {
            return false;
        }
        if let Some(kind) = self.kind
            && entry.metadata.kind != kind
        {
            return false;
        }
        if !self.tags.is_empty()
            && !self.tags.iter().any(|t| entry.metadata.tags.contains(t))
        {
            return false;
        }
        if let Some(after) = self.created_after
            && entry.created_at < after
        {
            return false;
        }
        if let Some(before) = self.created_before
            && entry.created_at > before
        {
            return false;
        }
        true
    }
}

/// A semantic retrieval request.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    /// Query text, embedded when no explicit vector is supplied.
    pub text: String,
    /// Precomputed query vector.
    pub embedding: Option<Vec<f32>>,
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum cosine similarity; defaults to the engine's configured
    /// threshold when unset.
    pub min_similarity: Option<f32>,
    /// Attribute filters applied before scoring.
    pub filter: Option<EntryFilter>,
    /// Keep embeddings on returned entries instead of stripping them.
    pub include_embeddings: bool,
}

impl RetrievalQuery {
    /// Query by text with default limits.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            top_k: 10,
            min_similarity: None,
            filter: None,
            include_embeddings: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn include_embeddings(mut self) -> Self {
        self.include_embeddings = true;
        self
    }
}

/// A retrieval hit with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    pub similarity: f32,
}

/// On-disk snapshot of both tiers.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MemorySnapshot {
    short_term: Vec<MemoryEntry>,
    long_term: Vec<MemoryEntry>,
}

/// Two-tier semantic memory with importance-weighted retention.
///
/// New entries land in the short-term tier. When that tier outgrows its
/// capacity the lowest-scored entries are consolidated into long-term;
/// when long-term outgrows its own bound the lowest-scored entries are
/// pruned outright. Capacity is checked after insert, not atomically with
/// it, so concurrent stores can transiently overshoot a bound until the
/// next consolidation or pruning pass restores it.
pub struct MemoryEngine {
    config: MemoryConfig,
    short_term: Arc<dyn MemoryStore>,
    long_term: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    /// Embeddings keyed by input text. Instance-scoped so engines stay
    /// independently testable.
    embedding_cache: Mutex<HashMap<String, Vec<f32>>>,
    events: EventBus<MemoryEvent>,
}

impl MemoryEngine {
    /// Create an engine with transient tier stores and the deterministic
    /// placeholder embedder.
    pub fn new(config: MemoryConfig) -> Self {
        let embedder = Arc::new(PlaceholderEmbedder::new(config.embedding_dimension));
        Self::with_parts(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            embedder,
        )
    }

    /// Create an engine over caller-supplied stores and embedder.
    pub fn with_parts(
        config: MemoryConfig,
        short_term: Arc<dyn MemoryStore>,
        long_term: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            short_term,
            long_term,
            embedder,
            embedding_cache: Mutex::new(HashMap::new()),
            events: EventBus::default(),
        }
    }

    /// Event bus carrying [`MemoryEvent`]s.
    pub fn events(&self) -> &EventBus<MemoryEvent> {
        &self.events
    }

    /// Load the persistence snapshot when enabled, then mark the engine
    /// ready.
    pub async fn initialize(&self) -> MemoryResult<()> {
        if self.config.persistence_enabled {
            let path = self.persistence_path()?;
            self.load_snapshot(&path).await?;
        }
        self.events.publish(MemoryEvent::Initialized);
        Ok(())
    }

    /// Persist both tiers when enabled, then mark the engine stopped.
    pub async fn shutdown(&self) -> MemoryResult<()> {
        if self.config.persistence_enabled {
            let path = self.persistence_path()?;
            self.persist_snapshot(&path).await?;
        }
        self.events.publish(MemoryEvent::Shutdown);
        Ok(())
    }

    /// Store a memory, filling defaults from the draft.
    ///
    /// Generates and caches an embedding when none is supplied, computes
    /// importance heuristically when unset, and writes the entry to the
    /// short-term tier, evicting any long-term copy of the same id.
    /// Capacity is then checked: short-term overflow triggers
    /// consolidation, and long-term overflow triggers pruning.
    ///
    /// Returns the stored entry.
    pub async fn store(&self, draft: EntryDraft) -> MemoryResult<MemoryEntry> {
        let embedding = match draft.embedding.clone() {
            Some(vector) => {
                if vector.len() != self.config.embedding_dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.embedding_dimension,
                        actual: vector.len(),
                    }
                    .into());
                }
                vector
            }
            None => self.embed_cached(&draft.content).await?,
        };

        let entry = draft.into_entry(embedding, Utc::now());
        let id = entry.id.clone();
        // Re-storing an id that consolidation moved to long-term reclaims
        // it: evict the long-term copy so the id lives in exactly one tier.
        self.long_term.delete(&id).await?;
        self.short_term.set(entry.clone()).await?;
        self.events.publish(MemoryEvent::Stored { id });

        if self.short_term.size().await? > self.config.short_term_capacity {
            self.consolidate().await?;
        }
        if self.long_term.size().await? > self.config.long_term_capacity {
            self.prune().await?;
        }

        Ok(entry)
    }

    /// Retrieve entries semantically similar to the query.
    ///
    /// Gathers both tiers, applies the attribute filter, scores by cosine
    /// similarity, drops hits below the threshold, and returns the top
    /// `top_k` ordered by descending similarity. Returned entries have
    /// their access stats bumped in whichever tier holds them, and
    /// embeddings are stripped unless the query asked for them.
    pub async fn retrieve(&self, query: RetrievalQuery) -> MemoryResult<Vec<ScoredEntry>> {
        let query_vector = match query.embedding {
            Some(vector) => vector,
            None => self.embed_cached(&query.text).await?,
        };
        let threshold = query
            .min_similarity
            .unwrap_or(self.config.similarity_threshold);

        let mut candidates: Vec<(Tier, MemoryEntry, f32)> = Vec::new();
        for (tier, store) in [
            (Tier::Short, &self.short_term),
            (Tier::Long, &self.long_term),
        ] {
            for entry in store.get_all().await? {
                if let Some(filter) = &query.filter
                    && !filter.matches(&entry)
                {
                    continue;
                }
                let similarity = cosine_similarity(&query_vector, &entry.embedding);
                if similarity >= threshold {
                    candidates.push((tier, entry, similarity));
                }
            }
        }

        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(query.top_k);

        let now = Utc::now();
        let mut results = Vec::with_capacity(candidates.len());
        for (tier, mut entry, similarity) in candidates {
            entry.touch(now);
            self.store_for(tier).set(entry.clone()).await?;
            let entry = if query.include_embeddings {
                entry
            } else {
                entry.without_embedding()
            };
            results.push(ScoredEntry { entry, similarity });
        }

        self.events.publish(MemoryEvent::Retrieved {
            matched: results.len(),
        });
        Ok(results)
    }

    /// Fetch an entry by id, checking short-term then long-term.
    ///
    /// A hit bumps the entry's access stats in its owning tier; the
    /// returned copy reflects the bump.
    pub async fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let (tier, entry) = match self.locate(id).await? {
            Some(found) => found,
            None => return Ok(None),
        };
        let mut entry = entry;
        entry.touch(Utc::now());
        self.store_for(tier).set(entry.clone()).await?;
        Ok(Some(entry))
    }

    /// Delete an entry from whichever tier holds it.
    pub async fn forget(&self, id: &str) -> MemoryResult<bool> {
        let removed = self.short_term.delete(id).await? || self.long_term.delete(id).await?;
        if removed {
            self.events.publish(MemoryEvent::Forgotten {
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    /// Empty both tiers and the embedding cache.
    pub async fn clear(&self) -> MemoryResult<()> {
        self.short_term.clear().await?;
        self.long_term.clear().await?;
        self.embedding_cache
            .lock()
            .map_err(|e| MemoryError::Store {
                reason: format!("lock poisoned: {}", e),
            })?
            .clear();
        self.events.publish(MemoryEvent::Cleared);
        Ok(())
    }

    /// Move the lowest-scored short-term entries into long-term, keeping
    /// the top `floor(short_term_capacity * 0.8)` in place.
    ///
    /// Returns how many entries moved.
    pub async fn consolidate(&self) -> MemoryResult<usize> {
        let now = Utc::now();
        let mut entries = self.short_term.get_all().await?;
        let keep = (self.config.short_term_capacity as f64 * 0.8).floor() as usize;
        if entries.len() <= keep {
            return Ok(0);
        }

        entries.sort_by(|a, b| {
            retention_score(b, now)
                .partial_cmp(&retention_score(a, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let demoted = entries.split_off(keep);
        let moved = demoted.len();
        for entry in demoted {
            // Delete before inserting so the id never exists in both tiers.
            self.short_term.delete(&entry.id).await?;
            self.long_term.set(entry).await?;
        }

        debug!(moved, "Consolidated short-term memory");
        self.events.publish(MemoryEvent::Consolidated { moved });
        Ok(moved)
    }

    /// Delete the lowest-scored long-term entries, keeping the top
    /// `floor(long_term_capacity * 0.9)`.
    ///
    /// Returns how many entries were deleted.
    pub async fn prune(&self) -> MemoryResult<usize> {
        let now = Utc::now();
        let mut entries = self.long_term.get_all().await?;
        let keep = (self.config.long_term_capacity as f64 * 0.9).floor() as usize;
        if entries.len() <= keep {
            return Ok(0);
        }

        entries.sort_by(|a, b| {
            retention_score(b, now)
                .partial_cmp(&retention_score(a, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let doomed = entries.split_off(keep);
        let deleted = doomed.len();
        for entry in doomed {
            self.long_term.delete(&entry.id).await?;
        }

        debug!(deleted, "Pruned long-term memory");
        self.events.publish(MemoryEvent::Pruned { deleted });
        Ok(deleted)
    }

    /// Number of entries currently in the short-term tier.
    pub async fn short_term_size(&self) -> MemoryResult<usize> {
        self.short_term.size().await
    }

    /// Number of entries currently in the long-term tier.
    pub async fn long_term_size(&self) -> MemoryResult<usize> {
        self.long_term.size().await
    }

    fn store_for(&self, tier: Tier) -> &Arc<dyn MemoryStore> {
        match tier {
            Tier::Short => &self.short_term,
            Tier::Long => &self.long_term,
        }
    }

    async fn locate(&self, id: &str) -> MemoryResult<Option<(Tier, MemoryEntry)>> {
        if let Some(entry) = self.short_term.get(id).await? {
            return Ok(Some((Tier::Short, entry)));
        }
        if let Some(entry) = self.long_term.get(id).await? {
            return Ok(Some((Tier::Long, entry)));
        }
        Ok(None)
    }

    async fn embed_cached(&self, text: &str) -> MemoryResult<Vec<f32>> {
        {
            let cache = self.embedding_cache.lock().map_err(|e| MemoryError::Store {
                reason: format!("lock poisoned: {}", e),
            })?;
            if let Some(vector) = cache.get(text) {
                return Ok(vector.clone());
            }
        }
        let vector = self.embedder.embed(text).await?;
        let mut cache = self.embedding_cache.lock().map_err(|e| MemoryError::Store {
            reason: format!("lock poisoned: {}", e),
        })?;
        cache.insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    fn persistence_path(&self) -> MemoryResult<std::path::PathBuf> {
        self.config
            .persistence_path
            .clone()
            .ok_or_else(|| MemoryError::Persistence {
                path: String::new(),
                reason: "persistence enabled but no path configured".to_string(),
            })
    }

    async fn load_snapshot(&self, path: &Path) -> MemoryResult<()> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "No memory snapshot, starting empty");
                return Ok(());
            }
            Err(e) => {
                return Err(MemoryError::Persistence {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let snapshot: MemorySnapshot =
            serde_json::from_str(&contents).map_err(|e| MemoryError::Serialization {
                reason: e.to_string(),
            })?;

        let entries = snapshot.short_term.len() + snapshot.long_term.len();
        for entry in snapshot.short_term {
            self.short_term.set(entry).await?;
        }
        for entry in snapshot.long_term {
            self.long_term.set(entry).await?;
        }
        debug!(path = ?path, entries, "Loaded memory snapshot");
        self.events.publish(MemoryEvent::Loaded { entries });
        Ok(())
    }

    async fn persist_snapshot(&self, path: &Path) -> MemoryResult<()> {
        let snapshot = MemorySnapshot {
            short_term: self.short_term.get_all().await?,
            long_term: self.long_term.get_all().await?,
        };
        let entries = snapshot.short_term.len() + snapshot.long_term.len();

        let json =
            serde_json::to_string_pretty(&snapshot).map_err(|e| MemoryError::Serialization {
                reason: e.to_string(),
            })?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|e| MemoryError::Persistence {
            path: tmp_path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            warn!(path = ?path, error = %e, "Failed to finalize memory snapshot");
            MemoryError::Persistence {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        self.events.publish(MemoryEvent::Persisted { entries });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
