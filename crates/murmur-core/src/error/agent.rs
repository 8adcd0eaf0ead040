//! Agent lifecycle and task-handling errors.

use thiserror::Error;

use crate::agent::AgentState;

/// Errors raised by an agent's lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// `initialize()` failed.
    #[error("agent initialization failed: {reason}")]
    InitializeFailed { reason: String },

    /// `start()` failed.
    #[error("agent failed to start: {reason}")]
    StartFailed { reason: String },

    /// `stop()` failed.
    #[error("agent failed to stop: {reason}")]
    StopFailed { reason: String },

    /// The agent is in the wrong state for the requested operation.
    #[error("cannot {operation} in state '{state}'")]
    InvalidState {
        state: AgentState,
        operation: String,
    },
}

/// Errors raised while executing a scheduled task.
///
/// Task failures are consumed by the scheduler's retry path; they are
/// never thrown back to the original submitter.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// No explicit target and no agent in `Running` state to select.
    #[error("no eligible agent available for task")]
    NoEligibleAgent,

    /// The targeted agent is not registered.
    #[error("target agent '{agent_id}' is not registered")]
    UnknownTarget { agent_id: String },

    /// The agent's handler returned an error.
    #[error("task handler failed: {reason}")]
    HandlerFailed { reason: String },

    /// The agent refused the task outright.
    #[error("task rejected: {reason}")]
    Rejected { reason: String },
}

/// Result type alias for agent lifecycle operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for task execution.
pub type TaskResult<T> = Result<T, TaskError>;
