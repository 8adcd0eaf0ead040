//! Message types routed between the runtime and its agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;

/// Dispatch priority for messages and the tasks that wrap them.
///
/// Variants are ordered from most to least urgent; the scheduler dispatches
/// numerically lower ranks first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must run before anything else.
    Critical,
    High,
    #[default]
    Normal,
    Low,
    /// Housekeeping traffic such as heartbeats.
    Background,
}

/// Kind of traffic an [`AgentMessage`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A request expecting the receiving agent to do work.
    Request,
    /// A response to an earlier request.
    Response,
    /// Fan-out traffic addressed to a group of agents.
    Broadcast,
    /// Liveness probe sent by the supervisor.
    Heartbeat,
}

/// A message submitted to the runtime for delivery to an agent.
///
/// Messages are immutable once submitted; the scheduler wraps them in a
/// task and never mutates the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message identifier.
    pub id: String,
    /// What kind of traffic this is.
    pub kind: MessageKind,
    /// Sender label, an agent id or `"runtime"`.
    pub from: String,
    /// Addressed recipient, if any. Routing is decided by the scheduler,
    /// which may override this with an explicit task target.
    pub to: Option<AgentId>,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// Dispatch priority.
    pub priority: Priority,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Create a new message with the given kind, sender, and payload.
    pub fn new(kind: MessageKind, from: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            from: from.into(),
            to: None,
            payload,
            priority: Priority::default(),
            timestamp: Utc::now(),
        }
    }

    /// Create a request message.
    pub fn request(from: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(MessageKind::Request, from, payload)
    }

    /// Create a background-priority heartbeat probe addressed to `to`.
    pub fn heartbeat(to: AgentId) -> Self {
        Self::new(MessageKind::Heartbeat, "runtime", serde_json::Value::Null)
            .addressed_to(to)
            .with_priority(Priority::Background)
    }

    /// Address the message to a specific agent.
    pub fn addressed_to(mut self, to: AgentId) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the dispatch priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_most_urgent_first() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert!(Priority::Low < Priority::Background);
    }

    #[test]
    fn heartbeat_is_background_priority() {
        let id = AgentId::new("probe-target").unwrap();
        let msg = AgentMessage::heartbeat(id.clone());
        assert_eq!(msg.kind, MessageKind::Heartbeat);
        assert_eq!(msg.priority, Priority::Background);
        assert_eq!(msg.to, Some(id));
    }
}
