//! Registry, queue, and runtime lifecycle errors.

use thiserror::Error;

use super::agent::AgentError;

/// Errors surfaced by the runtime's public surface.
///
/// These are always returned synchronously to the caller; internal task
/// failures go through the retry path and the event bus instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The pending task queue is at capacity; nothing was enqueued.
    #[error("task queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Registering another agent would exceed the configured cap.
    #[error("maximum agent count reached ({max})")]
    MaxAgentsReached { max: usize },

    /// An agent with this id is already registered.
    #[error("agent '{id}' is already registered")]
    DuplicateAgent { id: String },

    /// No agent with this id is registered.
    #[error("unknown agent '{id}'")]
    UnknownAgent { id: String },

    /// A swarm with this name already exists.
    #[error("swarm '{name}' already exists")]
    DuplicateSwarm { name: String },

    /// No swarm with this name exists.
    #[error("unknown swarm '{name}'")]
    UnknownSwarm { name: String },

    /// The runtime is shutting down and refuses new work.
    #[error("runtime is not accepting work")]
    NotRunning,

    /// An agent lifecycle call failed during registration or shutdown.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
