//! The agent capability contract and the handles the runtime injects
//! into every agent it manages.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{AgentError, TaskError};
use crate::message::AgentMessage;

/// Validated agent identifier.
///
/// `AgentId` is a newtype around `String` that enforces naming conventions
/// so registry lookups and log output stay consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct AgentId(String);

/// Errors that can occur when creating an [`AgentId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidAgentId {
    /// Identifier is empty or only whitespace.
    Empty,
    /// Identifier exceeds the maximum allowed length.
    TooLong(usize),
    /// Identifier contains characters outside `[A-Za-z0-9._:-]`.
    InvalidChars(String),
}

impl std::fmt::Display for InvalidAgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidAgentId::Empty => write!(f, "Agent id cannot be empty"),
            InvalidAgentId::TooLong(len) => {
                write!(f, "Agent id too long: {} characters (max 128)", len)
            }
            InvalidAgentId::InvalidChars(id) => {
                write!(f, "Agent id contains invalid characters: '{}'", id)
            }
        }
    }
}

impl std::error::Error for InvalidAgentId {}

impl AgentId {
    /// Maximum allowed length for agent ids.
    pub const MAX_LENGTH: usize = 128;

    /// Create a new validated agent id.
    ///
    /// Ids must be non-empty, at most 128 characters, and contain only
    /// alphanumeric characters, underscores, hyphens, dots, and colons.
    pub fn new(id: &str) -> Result<Self, InvalidAgentId> {
        if id.trim().is_empty() {
            return Err(InvalidAgentId::Empty);
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(InvalidAgentId::TooLong(id.len()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            return Err(InvalidAgentId::InvalidChars(id.to_string()));
        }
        Ok(AgentId(id.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = InvalidAgentId;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        AgentId::new(&id)
    }
}

/// Lifecycle state of a managed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Constructed but not yet initialized.
    Created,
    /// `initialize()` succeeded, `start()` in progress.
    Starting,
    /// Actively accepting tasks.
    Running,
    /// Started but not currently processing anything.
    Idle,
    /// `stop()` in progress.
    Stopping,
    /// Stopped cleanly.
    Stopped,
    /// Entered a failure state.
    Error,
}

impl AgentState {
    /// Whether the agent is eligible to receive routed tasks.
    pub fn is_running(self) -> bool {
        matches!(self, AgentState::Running)
    }

    /// Get the state as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Created => "created",
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Idle => "idle",
            AgentState::Stopping => "stopping",
            AgentState::Stopped => "stopped",
            AgentState::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cloneable handle over the runtime's shared state map.
///
/// Every registered agent receives a handle at registration time. Values
/// are arbitrary JSON; reads return clones.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<DashMap<String, serde_json::Value>>,
}

impl SharedState {
    /// Create an empty shared state map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner.insert(key.into(), value);
    }

    /// Remove a value, returning it if present.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("entries", &self.inner.len())
            .finish()
    }
}

/// Cloneable sender handle agents use to push messages back to the router.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    tx: mpsc::UnboundedSender<AgentMessage>,
}

impl MessageQueue {
    /// Create a queue, returning the sender handle and the receiving end
    /// the router drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a message onto the queue.
    ///
    /// Fails only when the receiving end has been dropped, which means the
    /// runtime is gone.
    pub fn send(&self, message: AgentMessage) -> Result<(), TaskError> {
        self.tx.send(message).map_err(|_| TaskError::Rejected {
            reason: "message queue closed".to_string(),
        })
    }
}

/// Capability contract every runtime-managed agent must satisfy.
///
/// Agent variants are opaque to the runtime: it only drives them through
/// this trait. Implementations use interior mutability since the runtime
/// holds agents behind `Arc`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier of this agent.
    fn id(&self) -> &AgentId;

    /// Current lifecycle state.
    fn state(&self) -> AgentState;

    /// One-time setup before the agent is started.
    async fn initialize(&self) -> Result<(), AgentError>;

    /// Begin accepting tasks.
    async fn start(&self) -> Result<(), AgentError>;

    /// Stop accepting tasks and release resources.
    async fn stop(&self) -> Result<(), AgentError>;

    /// Inject the runtime's shared state handle.
    fn set_shared_state(&self, shared: SharedState);

    /// Inject the router message-queue handle.
    fn set_message_queue(&self, queue: MessageQueue);

    /// Handle a routed message, returning the handler's JSON result.
    async fn submit_task(&self, message: AgentMessage) -> Result<serde_json::Value, TaskError>;
}
