//! In-process agent orchestration: registry, priority scheduling, swarms,
//! and supervision loops.
//!
//! The entry point is [`AgentRuntime`]. Construct it from a
//! [`RuntimeConfig`], register [`Agent`] implementations, and call
//! [`AgentRuntime::start`]; tasks submitted through
//! [`AgentRuntime::submit_task`] are queued by priority and dispatched to
//! worker slots as they free up.
//!
//! ```no_run
//! use std::sync::Arc;
//! use murmur_runtime::{AgentRuntime, RuntimeConfig};
//!
//! # async fn example(agent: Arc<dyn murmur_runtime::Agent>) -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = AgentRuntime::new(RuntimeConfig::default());
//! runtime.initialize().await?;
//! runtime.register_agent(agent).await?;
//! runtime.start();
//! // ...
//! runtime.stop().await;
//! # Ok(())
//! # }
//! ```

mod runtime;
mod scheduler;
mod swarm;
mod task;
mod worker;

pub use runtime::{AgentRuntime, HEALTH_TOPIC};
pub use scheduler::{SchedulerStats, TaskScheduler};
pub use swarm::Swarm;
pub use task::{ScheduledTask, SubmitOptions};
pub use worker::WorkerInfo;

pub use murmur_core::agent::{Agent, AgentId, AgentState, MessageQueue, SharedState};
pub use murmur_core::config::{MetricsConfig, RetryPolicy, RuntimeConfig};
pub use murmur_core::error::{AgentError, RuntimeError, RuntimeResult, TaskError};
pub use murmur_core::event::{EventBus, HealthReport, RuntimeEvent};
pub use murmur_core::message::{AgentMessage, MessageKind, Priority};
pub use murmur_core::metrics::{LogExporter, MetricsExporter, RuntimeMetrics};
