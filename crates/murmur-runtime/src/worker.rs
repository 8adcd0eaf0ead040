//! The fixed pool of logical execution slots.

use chrono::{DateTime, Utc};

/// One logical execution slot.
///
/// Invariant: `busy` is true exactly when `current_task` is `Some`.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Slot index, stable for the runtime's lifetime.
    pub id: usize,
    /// Whether the slot has a task in flight.
    pub busy: bool,
    /// Id of the task in flight, if any.
    pub current_task: Option<String>,
    /// Tasks this slot has completed successfully.
    pub tasks_completed: u64,
    /// Last claim or release.
    pub last_activity: DateTime<Utc>,
}

/// Fixed set of execution slots claimed by the dispatch loop.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: Vec<WorkerInfo>,
}

impl WorkerPool {
    pub(crate) fn new(slots: usize) -> Self {
        let now = Utc::now();
        let workers = (0..slots.max(1))
            .map(|id| WorkerInfo {
                id,
                busy: false,
                current_task: None,
                tasks_completed: 0,
                last_activity: now,
            })
            .collect();
        Self { workers }
    }

    /// Claim an idle slot for `task_id`, returning its index.
    pub(crate) fn claim_idle(&mut self, task_id: &str) -> Option<usize> {
        let worker = self.workers.iter_mut().find(|w| !w.busy)?;
        worker.busy = true;
        worker.current_task = Some(task_id.to_string());
        worker.last_activity = Utc::now();
        Some(worker.id)
    }

    /// Release a slot after its task finished; `completed` marks success.
    pub(crate) fn release(&mut self, worker_id: usize, completed: bool) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.busy = false;
            worker.current_task = None;
            worker.last_activity = Utc::now();
            if completed {
                worker.tasks_completed += 1;
            }
        }
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.busy).count()
    }

    pub(crate) fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.busy).count()
    }

    pub(crate) fn completed_total(&self) -> u64 {
        self.workers.iter().map(|w| w.tasks_completed).sum()
    }

    pub(crate) fn snapshot(&self) -> Vec<WorkerInfo> {
        self.workers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_and_release_keep_busy_flag_consistent() {
        let mut pool = WorkerPool::new(2);
        assert_eq!(pool.idle_count(), 2);

        let id = pool.claim_idle("t1").unwrap();
        let snapshot = pool.snapshot();
        assert!(snapshot[id].busy);
        assert_eq!(snapshot[id].current_task.as_deref(), Some("t1"));
        assert_eq!(pool.busy_count(), 1);

        pool.release(id, true);
        let snapshot = pool.snapshot();
        assert!(!snapshot[id].busy);
        assert!(snapshot[id].current_task.is_none());
        assert_eq!(snapshot[id].tasks_completed, 1);
    }

    #[test]
    fn claim_fails_when_all_busy() {
        let mut pool = WorkerPool::new(1);
        assert!(pool.claim_idle("t1").is_some());
        assert!(pool.claim_idle("t2").is_none());
    }

    #[test]
    fn failed_task_does_not_count_as_completed() {
        let mut pool = WorkerPool::new(1);
        let id = pool.claim_idle("t1").unwrap();
        pool.release(id, false);
        assert_eq!(pool.completed_total(), 0);
    }

    #[test]
    fn pool_always_has_at_least_one_slot() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.idle_count(), 1);
    }
}
