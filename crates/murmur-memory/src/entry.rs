//! Memory entries and the draft type callers hand to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a memory entry, weighting its default importance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Fact,
    Instruction,
    Preference,
    Context,
    #[default]
    Experience,
}

impl EntryKind {
    /// Importance weight applied by the heuristic when no explicit
    /// importance is supplied.
    pub fn importance_weight(self) -> f32 {
        match self {
            EntryKind::Fact => 0.8,
            EntryKind::Instruction => 0.9,
            EntryKind::Preference => 0.7,
            EntryKind::Context => 0.6,
            EntryKind::Experience => 0.5,
        }
    }
}

/// Descriptive metadata attached to every entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Who produced the entry.
    pub source: String,
    /// Category used for filtering and importance weighting.
    pub kind: EntryKind,
    /// Free-form tags; retrieval filters match on any overlap.
    pub tags: Vec<String>,
    /// Producer's confidence in the content, in [0, 1].
    pub confidence: f32,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            source: "agent".to_string(),
            kind: EntryKind::default(),
            tags: Vec::new(),
            confidence: 1.0,
        }
    }
}

/// A single stored memory.
///
/// An entry is owned by whichever tier store currently holds it; the same
/// id never exists in both tiers at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique entry identifier.
    pub id: String,
    /// The remembered text.
    pub content: String,
    /// Fixed-dimension semantic vector for similarity retrieval.
    pub embedding: Vec<f32>,
    /// Descriptive metadata.
    pub metadata: EntryMetadata,
    /// When the entry was stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last returned by `get` or `retrieve`.
    pub last_accessed_at: DateTime<Utc>,
    /// How many times the entry has been accessed. Monotone while the
    /// entry exists.
    pub access_count: u64,
    /// Retention weight in [0, 1].
    pub importance: f32,
}

impl MemoryEntry {
    /// Record an access at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    /// Copy of this entry with the embedding removed, for returning to
    /// callers that did not ask for vectors.
    pub fn without_embedding(&self) -> Self {
        let mut copy = self.clone();
        copy.embedding = Vec::new();
        copy
    }
}

/// Partial entry handed to [`store`](crate::MemoryEngine::store).
///
/// Only `content` is required; the engine fills every other field with
/// defaults, generates an embedding when none is supplied, and computes
/// importance heuristically when unset.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub content: String,
    pub id: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub source: Option<String>,
    pub kind: Option<EntryKind>,
    pub tags: Vec<String>,
    pub confidence: Option<f32>,
    pub importance: Option<f32>,
}

impl EntryDraft {
    /// Start a draft from content text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Use a caller-chosen id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Supply a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set importance explicitly, skipping the heuristic. Clamped to [0, 1].
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Materialize a full entry at `now` with the resolved `embedding`.
    ///
    /// The engine calls this after generating an embedding; it is public
    /// so store backends can be seeded directly.
    pub fn into_entry(self, embedding: Vec<f32>, now: DateTime<Utc>) -> MemoryEntry {
        let metadata = EntryMetadata {
            source: self.source.unwrap_or_else(|| "agent".to_string()),
            kind: self.kind.unwrap_or_default(),
            tags: self.tags,
            confidence: self.confidence.unwrap_or(1.0),
        };
        let importance = self
            .importance
            .unwrap_or_else(|| heuristic_importance(&self.content, &metadata))
            .clamp(0.0, 1.0);
        MemoryEntry {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            content: self.content,
            embedding,
            metadata,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            importance,
        }
    }
}

/// Default importance for an entry without an explicit value:
/// base 0.5 scaled by confidence, plus up to 0.2 for longer content,
/// weighted by the entry kind, clamped to [0, 1].
fn heuristic_importance(content: &str, metadata: &EntryMetadata) -> f32 {
    let base = 0.5 * metadata.confidence;
    let length_bonus = (content.len() as f32 / 1000.0).min(1.0) * 0.2;
    ((base + length_bonus) * metadata.kind.importance_weight()).clamp(0.0, 1.0)
}
