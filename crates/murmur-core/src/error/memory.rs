//! Memory engine, storage backend, and embedding errors.

use thiserror::Error;

/// Errors raised by an embedder implementation.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// A supplied vector does not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedder failed to produce a vector.
    #[error("embedding failed: {reason}")]
    Failed { reason: String },
}

/// Errors raised by the memory engine and its storage backends.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// No entry with this id exists in either tier.
    #[error("memory entry '{id}' not found")]
    NotFound { id: String },

    /// A storage backend operation failed.
    #[error("memory store operation failed: {reason}")]
    Store { reason: String },

    /// Reading or writing the persistence snapshot failed.
    #[error("memory persistence failed at '{path}': {reason}")]
    Persistence { path: String, reason: String },

    /// Snapshot (de)serialization failed.
    #[error("memory serialization failed: {reason}")]
    Serialization { reason: String },

    /// Embedding generation or validation failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
