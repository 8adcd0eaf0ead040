//! Scheduled tasks and submission options.

use std::time::Duration;

use chrono::{DateTime, Utc};

use murmur_core::agent::AgentId;
use murmur_core::message::{AgentMessage, Priority};

/// A unit of scheduled work wrapping a message.
///
/// Owned exclusively by the scheduler: a task lives either in the pending
/// queue or in the active map, never both, and is dropped on terminal
/// completion or failure.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Unique task identifier, distinct from the message id.
    pub id: String,
    /// The wrapped message, immutable once submitted.
    pub message: AgentMessage,
    /// Explicit target agent; when `None` the scheduler selects among
    /// running agents.
    pub target: Option<AgentId>,
    /// When the task was submitted.
    pub scheduled_at: DateTime<Utc>,
    /// Earliest time the task may dispatch.
    pub execute_at: DateTime<Utc>,
    /// Dispatch priority; lower rank dispatches first.
    pub priority: Priority,
    /// Retries consumed so far.
    pub retries: u32,
    /// Retry budget.
    pub max_retries: u32,
}

/// Caller-supplied knobs for [`submit`](crate::TaskScheduler::submit).
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Route to this agent instead of letting the scheduler pick one.
    pub agent_id: Option<AgentId>,
    /// Hold the task back for this long before it becomes ready.
    pub delay: Option<Duration>,
    /// Override the message's priority.
    pub priority: Option<Priority>,
    /// Override the runtime's default retry budget.
    pub max_retries: Option<u32>,
}

impl SubmitOptions {
    pub fn target(agent_id: AgentId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

impl ScheduledTask {
    /// Build a task from a message and options at `now`.
    pub(crate) fn new(
        message: AgentMessage,
        opts: SubmitOptions,
        default_max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let delay = opts
            .delay
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(chrono::Duration::zero);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            priority: opts.priority.unwrap_or(message.priority),
            target: opts.agent_id.or_else(|| message.to.clone()),
            message,
            scheduled_at: now,
            execute_at: now + delay,
            retries: 0,
            max_retries: opts.max_retries.unwrap_or(default_max_retries),
        }
    }

    /// Whether the task may dispatch at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.execute_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_override_message_priority() {
        let now = Utc::now();
        let message =
            AgentMessage::request("test", serde_json::Value::Null).with_priority(Priority::Low);
        let task = ScheduledTask::new(
            message.clone(),
            SubmitOptions::default().with_priority(Priority::High),
            3,
            now,
        );
        assert_eq!(task.priority, Priority::High);

        let task = ScheduledTask::new(message, SubmitOptions::default(), 3, now);
        assert_eq!(task.priority, Priority::Low);
    }

    #[test]
    fn delay_pushes_execute_at() {
        let now = Utc::now();
        let message = AgentMessage::request("test", serde_json::Value::Null);
        let task = ScheduledTask::new(
            message,
            SubmitOptions::default().with_delay(Duration::from_secs(5)),
            3,
            now,
        );
        assert!(!task.is_ready(now));
        assert!(task.is_ready(now + chrono::Duration::seconds(5)));
    }

    #[test]
    fn addressed_message_becomes_target() {
        let now = Utc::now();
        let to = AgentId::new("receiver").unwrap();
        let message =
            AgentMessage::request("test", serde_json::Value::Null).addressed_to(to.clone());
        let task = ScheduledTask::new(message, SubmitOptions::default(), 3, now);
        assert_eq!(task.target, Some(to));
    }
}
