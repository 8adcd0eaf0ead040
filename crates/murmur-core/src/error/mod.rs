//! Error types for the Murmur runtime and memory subsystem.
//!
//! The error types are organized into focused submodules:
//! - `agent`: agent lifecycle and task-handling errors
//! - `runtime`: registry, queue, and lifecycle errors
//! - `memory`: memory engine, storage, and embedding errors

mod agent;
mod memory;
mod runtime;

pub use agent::{AgentError, AgentResult, TaskError, TaskResult};
pub use memory::{EmbeddingError, MemoryError, MemoryResult};
pub use runtime::{RuntimeError, RuntimeResult};
