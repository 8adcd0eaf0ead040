//! # Murmur Memory
//!
//! Two-tier semantic memory for the Murmur agent runtime: a short-term
//! and a long-term store, cosine-similarity retrieval over deterministic
//! embeddings, and importance-weighted consolidation and pruning.

pub mod embedding;
pub mod engine;
pub mod entry;
pub mod file_store;
pub mod retention;
pub mod store;

pub use embedding::{Embedder, PlaceholderEmbedder, cosine_similarity};
pub use engine::{EntryFilter, MemoryEngine, RetrievalQuery, ScoredEntry};
pub use entry::{EntryDraft, EntryKind, EntryMetadata, MemoryEntry};
pub use file_store::FileStore;
pub use retention::retention_score;
pub use store::{InMemoryStore, MemoryStore};

// Re-export the config and error types callers need alongside the engine.
pub use murmur_core::config::MemoryConfig;
pub use murmur_core::error::{EmbeddingError, MemoryError, MemoryResult};
pub use murmur_core::event::MemoryEvent;
