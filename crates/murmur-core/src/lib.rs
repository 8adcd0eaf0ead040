//! # Murmur Core
//!
//! Shared types and contracts for the Murmur agent runtime: the agent
//! capability trait, message and priority types, the typed event surface,
//! the error hierarchy, and the configuration surface.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod metrics;

pub use agent::{Agent, AgentId, AgentState, InvalidAgentId, MessageQueue, SharedState};
pub use config::{MemoryConfig, MetricsConfig, RetryPolicy, RuntimeConfig};
pub use error::{
    AgentError, AgentResult, EmbeddingError, MemoryError, MemoryResult, RuntimeError,
    RuntimeResult, TaskError, TaskResult,
};
pub use event::{EventBus, HealthReport, MemoryEvent, RuntimeEvent};
pub use message::{AgentMessage, MessageKind, Priority};
pub use metrics::{LogExporter, MetricsExporter, RuntimeMetrics};
