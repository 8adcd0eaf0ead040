//! Aggregated runtime counters and the exporter seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of runtime counters, handed to every
/// configured exporter on each metrics interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    /// Registered agents, total.
    pub agents_total: usize,
    /// Agents currently in `Running` state.
    pub agents_running: usize,
    /// Agents currently in `Idle` state.
    pub agents_idle: usize,
    /// Agents currently in `Error` state.
    pub agents_error: usize,
    /// Tasks waiting in the pending queue.
    pub tasks_queued: usize,
    /// Tasks currently executing.
    pub tasks_active: usize,
    /// Tasks completed across all workers since start.
    pub tasks_completed: u64,
    /// Workers with a task in flight.
    pub workers_busy: usize,
    /// Workers waiting for work.
    pub workers_idle: usize,
    /// When the snapshot was taken.
    pub collected_at: DateTime<Utc>,
}

/// Sink for metrics snapshots.
///
/// Exporters are registered on the runtime before `start()`; each one
/// receives every snapshot the metrics loop collects.
pub trait MetricsExporter: Send + Sync {
    /// Name used in log output when an exporter misbehaves.
    fn name(&self) -> &str;

    /// Hand a snapshot to the sink.
    fn export(&self, metrics: &RuntimeMetrics);
}

/// Exporter that writes each snapshot as a structured log line.
#[derive(Debug, Default)]
pub struct LogExporter;

impl MetricsExporter for LogExporter {
    fn name(&self) -> &str {
        "log"
    }

    fn export(&self, metrics: &RuntimeMetrics) {
        tracing::info!(
            agents_total = metrics.agents_total,
            agents_running = metrics.agents_running,
            agents_idle = metrics.agents_idle,
            agents_error = metrics.agents_error,
            tasks_queued = metrics.tasks_queued,
            tasks_active = metrics.tasks_active,
            tasks_completed = metrics.tasks_completed,
            workers_busy = metrics.workers_busy,
            workers_idle = metrics.workers_idle,
            "runtime metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_exporter_accepts_snapshot() {
        let exporter = LogExporter;
        let metrics = RuntimeMetrics {
            agents_total: 2,
            agents_running: 1,
            agents_idle: 1,
            agents_error: 0,
            tasks_queued: 0,
            tasks_active: 0,
            tasks_completed: 5,
            workers_busy: 0,
            workers_idle: 4,
            collected_at: Utc::now(),
        };
        exporter.export(&metrics);
        assert_eq!(exporter.name(), "log");
    }
}
