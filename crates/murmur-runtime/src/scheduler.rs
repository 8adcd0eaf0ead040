//! Priority task queue, dispatch, and bounded retry.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use murmur_core::agent::{Agent, AgentId};
use murmur_core::config::{RetryPolicy, RuntimeConfig};
use murmur_core::error::{RuntimeError, RuntimeResult, TaskError};
use murmur_core::event::{EventBus, RuntimeEvent};
use murmur_core::message::AgentMessage;

use crate::task::{ScheduledTask, SubmitOptions};
use crate::worker::{WorkerInfo, WorkerPool};

/// Counters sampled by the metrics loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub tasks_queued: usize,
    pub tasks_active: usize,
    pub tasks_completed: u64,
    pub workers_busy: usize,
    pub workers_idle: usize,
}

/// Queue, active map, and worker table.
///
/// All three structures mutate together, so they live behind one lock:
/// the source design is single-writer and this keeps it that way under
/// real threads.
struct SchedulerState {
    queue: VecDeque<ScheduledTask>,
    active: HashMap<String, ScheduledTask>,
    workers: WorkerPool,
}

/// Outcome of a task execution, resolved under the state lock and
/// emitted after it is released.
enum Outcome {
    Completed,
    Retried { attempt: u32 },
    Failed { reason: String },
}

/// Matches ready tasks to idle workers and drives retries.
pub struct TaskScheduler {
    config: RuntimeConfig,
    state: Mutex<SchedulerState>,
    agents: Arc<DashMap<AgentId, Arc<dyn Agent>>>,
    events: EventBus<RuntimeEvent>,
    round_robin: AtomicUsize,
}

impl TaskScheduler {
    pub(crate) fn new(
        config: RuntimeConfig,
        agents: Arc<DashMap<AgentId, Arc<dyn Agent>>>,
        events: EventBus<RuntimeEvent>,
    ) -> Self {
        let workers = WorkerPool::new(config.worker_slots);
        Self {
            config,
            state: Mutex::new(SchedulerState {
                queue: VecDeque::new(),
                active: HashMap::new(),
                workers,
            }),
            agents,
            events,
            round_robin: AtomicUsize::new(0),
        }
    }

    // A poisoned lock means a panic mid-mutation elsewhere; the state
    // itself is a plain queue and table, still usable.
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a message as a scheduled task, returning the task id.
    ///
    /// Fails with [`RuntimeError::QueueFull`] when the pending queue is
    /// at capacity; nothing is enqueued in that case.
    pub fn submit(&self, message: AgentMessage, opts: SubmitOptions) -> RuntimeResult<String> {
        let task = ScheduledTask::new(message, opts, self.config.default_max_retries, Utc::now());
        let id = task.id.clone();
        {
            let mut state = self.state();
            if state.queue.len() >= self.config.task_queue_size {
                return Err(RuntimeError::QueueFull {
                    capacity: self.config.task_queue_size,
                });
            }
            insert_by_priority(&mut state.queue, task);
        }
        debug!(task_id = %id, "Task submitted");
        self.events
            .publish(RuntimeEvent::TaskSubmitted { task_id: id.clone() });
        Ok(id)
    }

    /// One dispatch tick: assign every ready task to an idle worker, in
    /// queue order, stopping as soon as the pool is exhausted.
    pub(crate) fn dispatch_ready(self: &Arc<Self>) {
        let now = Utc::now();
        let mut launches = Vec::new();
        {
            let mut state = self.state();
            while state.workers.idle_count() > 0 {
                let Some(pos) = state.queue.iter().position(|t| t.is_ready(now)) else {
                    break;
                };
                let Some(task) = state.queue.remove(pos) else {
                    break;
                };
                let Some(worker_id) = state.workers.claim_idle(&task.id) else {
                    state.queue.insert(pos, task);
                    break;
                };
                state.active.insert(task.id.clone(), task.clone());
                launches.push((worker_id, task));
            }
        }
        for (worker_id, task) in launches {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.execute(worker_id, task).await;
            });
        }
    }

    /// Run one task on its claimed worker and settle the outcome.
    ///
    /// The worker is released on every path; a failed task re-enters the
    /// queue until its retry budget is spent, then is dropped with a
    /// `TaskFailed` event. Failures never reach the submitter.
    async fn execute(&self, worker_id: usize, task: ScheduledTask) {
        let result = self.route(&task).await;

        let outcome = {
            let mut state = self.state();
            state.active.remove(&task.id);
            match result {
                Ok(_) => {
                    state.workers.release(worker_id, true);
                    Outcome::Completed
                }
                Err(err) => {
                    state.workers.release(worker_id, false);
                    if task.retries < task.max_retries {
                        let mut retry = task.clone();
                        retry.retries += 1;
                        let attempt = retry.retries;
                        // Retries bypass the capacity check: the task
                        // already held a queue slot when first admitted.
                        match self.config.retry_policy {
                            RetryPolicy::Tail => state.queue.push_back(retry),
                            RetryPolicy::Priority => insert_by_priority(&mut state.queue, retry),
                        }
                        Outcome::Retried { attempt }
                    } else {
                        Outcome::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::Completed => {
                self.events.publish(RuntimeEvent::TaskCompleted {
                    task_id: task.id,
                    worker_id,
                });
            }
            Outcome::Retried { attempt } => {
                debug!(task_id = %task.id, attempt, "Task retried");
                self.events.publish(RuntimeEvent::TaskRetried {
                    task_id: task.id,
                    attempt,
                });
            }
            Outcome::Failed { reason } => {
                warn!(task_id = %task.id, reason = %reason, "Task failed permanently");
                self.events.publish(RuntimeEvent::TaskFailed {
                    task_id: task.id,
                    reason,
                });
            }
        }
    }

    /// Resolve the target agent and deliver the task's message.
    async fn route(&self, task: &ScheduledTask) -> Result<serde_json::Value, TaskError> {
        let agent = match &task.target {
            Some(id) => self
                .agents
                .get(id)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| TaskError::UnknownTarget {
                    agent_id: id.to_string(),
                })?,
            None => self
                .select_running_agent()
                .ok_or(TaskError::NoEligibleAgent)?,
        };
        agent.submit_task(task.message.clone()).await
    }

    /// Round-robin over agents currently in `Running` state.
    fn select_running_agent(&self) -> Option<Arc<dyn Agent>> {
        let mut running: Vec<(AgentId, Arc<dyn Agent>)> = self
            .agents
            .iter()
            .filter(|entry| entry.value().state().is_running())
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        if running.is_empty() {
            return None;
        }
        // Sort for a stable rotation order regardless of map iteration.
        running.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % running.len();
        Some(Arc::clone(&running[idx].1))
    }

    /// Number of tasks waiting in the pending queue.
    pub fn queued_len(&self) -> usize {
        self.state().queue.len()
    }

    /// Number of tasks currently executing.
    pub fn active_len(&self) -> usize {
        self.state().active.len()
    }

    /// Point-in-time counters for the metrics loop.
    pub fn stats(&self) -> SchedulerStats {
        let state = self.state();
        SchedulerStats {
            tasks_queued: state.queue.len(),
            tasks_active: state.active.len(),
            tasks_completed: state.workers.completed_total(),
            workers_busy: state.workers.busy_count(),
            workers_idle: state.workers.idle_count(),
        }
    }

    /// Copy of the worker table.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.state().workers.snapshot()
    }

    #[cfg(test)]
    fn queued_ids(&self) -> Vec<String> {
        self.state().queue.iter().map(|t| t.id.clone()).collect()
    }
}

/// Insert at the first position whose priority is numerically greater,
/// preserving submission order among equal priorities.
fn insert_by_priority(queue: &mut VecDeque<ScheduledTask>, task: ScheduledTask) {
    let pos = queue
        .iter()
        .position(|queued| queued.priority > task.priority)
        .unwrap_or(queue.len());
    queue.insert(pos, task);
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::message::Priority;

    fn scheduler(queue_size: usize) -> Arc<TaskScheduler> {
        let config = RuntimeConfig {
            task_queue_size: queue_size,
            ..Default::default()
        };
        Arc::new(TaskScheduler::new(
            config,
            Arc::new(DashMap::new()),
            EventBus::default(),
        ))
    }

    fn message(priority: Priority) -> AgentMessage {
        AgentMessage::request("test", serde_json::Value::Null).with_priority(priority)
    }

    #[test]
    fn queue_orders_by_priority() {
        let scheduler = scheduler(10);
        let low = scheduler
            .submit(message(Priority::Low), SubmitOptions::default())
            .unwrap();
        let high = scheduler
            .submit(message(Priority::High), SubmitOptions::default())
            .unwrap();
        let normal = scheduler
            .submit(message(Priority::Normal), SubmitOptions::default())
            .unwrap();

        assert_eq!(scheduler.queued_ids(), vec![high, normal, low]);
    }

    #[test]
    fn equal_priorities_keep_submission_order() {
        let scheduler = scheduler(10);
        let first = scheduler
            .submit(message(Priority::Normal), SubmitOptions::default())
            .unwrap();
        let second = scheduler
            .submit(message(Priority::Normal), SubmitOptions::default())
            .unwrap();

        assert_eq!(scheduler.queued_ids(), vec![first, second]);
    }

    #[test]
    fn full_queue_rejects_without_enqueueing() {
        let scheduler = scheduler(2);
        scheduler
            .submit(message(Priority::Normal), SubmitOptions::default())
            .unwrap();
        scheduler
            .submit(message(Priority::Normal), SubmitOptions::default())
            .unwrap();

        let err = scheduler
            .submit(message(Priority::Critical), SubmitOptions::default())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::QueueFull { capacity: 2 }));
        assert_eq!(scheduler.queued_len(), 2);
    }

    #[test]
    fn delayed_task_is_not_ready() {
        let scheduler = scheduler(10);
        scheduler
            .submit(
                message(Priority::Normal),
                SubmitOptions::default().with_delay(std::time::Duration::from_secs(60)),
            )
            .unwrap();

        scheduler.dispatch_ready();
        // Still queued: the delay has not elapsed.
        assert_eq!(scheduler.queued_len(), 1);
        assert_eq!(scheduler.active_len(), 0);
    }
}
