//! Configuration surface for the runtime and the memory engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where a retried task re-enters the queue.
///
/// The source design re-enqueues retries at the tail, which loses the
/// task's original priority rank. Whether that is intended is an open
/// question, so the behavior is configurable rather than silently fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// Re-enqueue at the back of the queue, after everything already
    /// pending regardless of priority.
    #[default]
    Tail,
    /// Re-insert at the task's original priority rank.
    Priority,
}

/// Metrics emission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the metrics loop runs at all.
    pub enabled: bool,
    /// Collection cadence in milliseconds.
    pub interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
        }
    }
}

/// Runtime-wide settings, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Hard cap on concurrently registered agents.
    pub max_agents: usize,
    /// Hard cap on pending (non-active) tasks.
    pub task_queue_size: usize,
    /// Logical worker slots claiming ready tasks.
    pub worker_slots: usize,
    /// Heartbeat broadcast cadence in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Health sampling cadence in milliseconds.
    pub health_check_interval_ms: u64,
    /// Dispatch tick period in milliseconds.
    pub dispatch_interval_ms: u64,
    /// How long `stop()` waits for active tasks to drain before
    /// force-stopping agents.
    pub graceful_shutdown_timeout_ms: u64,
    /// Retry budget applied when a submission does not specify one.
    pub default_max_retries: u32,
    /// Where retried tasks re-enter the queue.
    pub retry_policy: RetryPolicy,
    /// Metrics emission settings.
    pub metrics: MetricsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_agents: 100,
            task_queue_size: 1000,
            worker_slots: default_worker_slots(),
            heartbeat_interval_ms: 30_000,
            health_check_interval_ms: 10_000,
            dispatch_interval_ms: 10,
            graceful_shutdown_timeout_ms: 30_000,
            default_max_retries: 3,
            retry_policy: RetryPolicy::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Heartbeat cadence as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Health sampling cadence as a [`Duration`].
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Dispatch tick period as a [`Duration`].
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    /// Drain deadline as a [`Duration`].
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_timeout_ms)
    }

    /// Metrics cadence as a [`Duration`].
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics.interval_ms)
    }
}

fn default_worker_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Memory engine settings, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Short-term tier bound; exceeding it triggers consolidation.
    pub short_term_capacity: usize,
    /// Long-term tier bound; exceeding it triggers pruning.
    pub long_term_capacity: usize,
    /// Fixed embedding vector length.
    pub embedding_dimension: usize,
    /// Default minimum cosine similarity for retrieval.
    pub similarity_threshold: f32,
    /// Reserved; the engine currently stores entries uncompressed.
    pub compression_enabled: bool,
    /// Whether to load/persist a snapshot at initialize/shutdown.
    pub persistence_enabled: bool,
    /// Snapshot location; required when persistence is enabled.
    pub persistence_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 100,
            long_term_capacity: 10_000,
            embedding_dimension: 128,
            similarity_threshold: 0.7,
            compression_enabled: false,
            persistence_enabled: false,
            persistence_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_agents, 100);
        assert_eq!(config.task_queue_size, 1000);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.retry_policy, RetryPolicy::Tail);
        assert!(config.worker_slots >= 1);
        assert_eq!(config.dispatch_interval(), Duration::from_millis(10));
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"max_agents": 5, "retry_policy": "priority"}"#).unwrap();
        assert_eq!(config.max_agents, 5);
        assert_eq!(config.retry_policy, RetryPolicy::Priority);
        assert_eq!(config.task_queue_size, 1000);
    }

    #[test]
    fn memory_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.short_term_capacity, 100);
        assert_eq!(config.embedding_dimension, 128);
        assert!(!config.persistence_enabled);
    }
}
