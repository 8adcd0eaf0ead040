//! Typed event surface for the runtime and the memory engine.
//!
//! Events are closed enums published on a broadcast bus rather than
//! free-form strings, so observers can match exhaustively and payload
//! changes show up as compile errors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::agent::{AgentId, AgentState};
use crate::metrics::RuntimeMetrics;

/// Broadcast bus carrying a closed event enum.
///
/// Publishing with no subscribers is not an error; late subscribers only
/// see events published after they subscribe.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Create a bus retaining up to `capacity` undelivered events per
    /// subscriber before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: E) {
        // A send error only means nobody is listening.
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Snapshot of every registered agent's state, produced by the health loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Agent state keyed by agent id.
    pub states: HashMap<String, AgentState>,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

impl HealthReport {
    /// Number of agents currently in the given state.
    pub fn count_in(&self, state: AgentState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Events emitted by the agent runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Middleware and router are booted.
    Initialized,
    /// Periodic activities are running.
    Started,
    /// Shutdown finished; the runtime is no longer running.
    Stopped,
    /// `stop()` was called; drain is in progress.
    ShutdownInitiated,
    /// Drain timed out; agents still running were force-stopped.
    ForceShutdown { aborted_agents: Vec<AgentId> },
    AgentRegistered { agent_id: AgentId },
    AgentUnregistered { agent_id: AgentId },
    SwarmCreated { name: String, members: usize },
    TaskSubmitted { task_id: String },
    TaskCompleted { task_id: String, worker_id: usize },
    /// A failed task was re-enqueued; `attempt` counts retries so far.
    TaskRetried { task_id: String, attempt: u32 },
    /// Retries are exhausted; the task was dropped.
    TaskFailed { task_id: String, reason: String },
    /// Heartbeat delivery to one agent failed; the broadcast continued.
    HeartbeatFailed { agent_id: AgentId, reason: String },
    HealthCheck { report: HealthReport },
    MetricsCollected { metrics: RuntimeMetrics },
}

/// Events emitted by the memory engine.
#[derive(Debug, Clone)]
pub enum MemoryEvent {
    Initialized,
    Shutdown,
    Stored { id: String },
    /// A retrieval returned `matched` entries.
    Retrieved { matched: usize },
    Forgotten { id: String },
    Cleared,
    /// Consolidation moved `moved` entries from short-term to long-term.
    Consolidated { moved: usize },
    /// Pruning deleted `deleted` entries from long-term.
    Pruned { deleted: usize },
    /// A persistence snapshot was loaded with `entries` entries.
    Loaded { entries: usize },
    /// A persistence snapshot was written with `entries` entries.
    Persisted { entries: usize },
}
