//! Task lifecycle events.

use crate::error::WarmupError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle transition reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupStatus {
    Registered,
    Unregistered,
    Queued { priority: i32 },
    Started,
    Completed { duration: Duration },
    Failed { duration: Duration, error: WarmupError },
    Retrying { attempt: u32, delay: Duration },
}

impl WarmupStatus {
    /// Short status name, as used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
            Self::Queued { .. } => "queued",
            Self::Started => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Retrying { .. } => "retrying",
        }
    }
}

/// A lifecycle event for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupEvent {
    pub task_id: String,
    pub task_name: String,
    pub status: WarmupStatus,
    pub at: DateTime<Utc>,
}

impl WarmupEvent {
    pub(crate) fn new(task_id: &str, task_name: &str, status: WarmupStatus) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_name: task_name.to_string(),
            status,
            at: Utc::now(),
        }
    }
}

/// Observer invoked synchronously, in emission order, for every event.
pub type WarmupListener = Arc<dyn Fn(&WarmupEvent) + Send + Sync>;
