//! Error types for warmup operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for warmup operations.
pub type WarmupResult<T> = Result<T, WarmupError>;

/// Error returned by a task routine.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Warmup-specific errors.
///
/// Cloneable so a failure can travel on a lifecycle event and still be
/// returned to a direct caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarmupError {
    /// No task registered under this id
    #[error("Warmup task not found: {0}")]
    TaskNotFound(String),

    /// Task exceeded its declared timeout
    #[error("Warmup task '{task_id}' timed out after {timeout:?}")]
    Timeout { task_id: String, timeout: Duration },

    /// Task routine returned an error
    #[error("Warmup task '{task_id}' failed: {message}")]
    ExecutionFailed { task_id: String, message: String },

    /// Task routine panicked
    #[error("Warmup task '{task_id}' panicked")]
    Panicked { task_id: String },

    /// Scheduler already running
    #[error("Warmup scheduler already running")]
    SchedulerAlreadyRunning,

    /// Scheduler not running
    #[error("Warmup scheduler not running")]
    SchedulerNotRunning,

    /// `start` was called outside a Tokio runtime
    #[error("Warmup scheduler requires a running Tokio runtime")]
    NoRuntime,
}

impl WarmupError {
    /// Whether this failure was caused by the task's timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Id of the task the error refers to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskNotFound(id) => Some(id),
            Self::Timeout { task_id, .. }
            | Self::ExecutionFailed { task_id, .. }
            | Self::Panicked { task_id } => Some(task_id),
            Self::SchedulerAlreadyRunning | Self::SchedulerNotRunning | Self::NoRuntime => None,
        }
    }
}
