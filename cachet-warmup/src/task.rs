//! Warmup task definition.

use crate::error::TaskError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Boxed future produced by a task routine.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// Task routine type.
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Bounded re-queue policy for a task that fails during a periodic drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRetry {
    /// Maximum number of re-queues after the first failure
    pub attempts: u32,

    /// Minimum wait before a re-queued task becomes eligible again
    pub delay: Duration,
}

/// A named, prioritized routine that pre-populates cache entries.
#[derive(Clone)]
pub struct WarmupTask {
    /// Unique task id
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Priority, higher runs first
    pub priority: i32,

    /// Maximum time the scheduler waits for the routine
    pub timeout: Option<Duration>,

    /// Re-queue policy on failure
    pub retry: Option<TaskRetry>,

    routine: TaskFn,
}

impl WarmupTask {
    /// Create a new task with priority 0, no timeout and no retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet_warmup::WarmupTask;
    /// use std::time::Duration;
    ///
    /// let task = WarmupTask::new("popular-products", "Popular products", || async {
    ///     // load and cache the top products
    ///     Ok(())
    /// })
    /// .with_priority(10)
    /// .with_timeout(Duration::from_secs(30));
    ///
    /// assert_eq!(task.priority, 10);
    /// ```
    pub fn new<F, Fut>(id: impl Into<String>, name: impl Into<String>, routine: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let routine: TaskFn = Arc::new(move || -> TaskFuture { Box::pin(routine()) });

        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            priority: 0,
            timeout: None,
            retry: None,
            routine,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Re-queue up to `attempts` times, waiting at least `delay` between runs.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry = Some(TaskRetry { attempts, delay });
        self
    }

    /// Start the routine.
    pub fn execute(&self) -> TaskFuture {
        (self.routine)()
    }
}

impl fmt::Debug for WarmupTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmupTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Last known state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Registered, not queued
    Registered,

    /// Waiting in the pending queue
    Queued,

    /// Routine in flight
    Running,

    /// Last run completed
    Completed,

    /// Last run failed
    Failed(String),
}

/// Task statistics.
#[derive(Debug, Clone)]
pub struct TaskStats {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub run_count: u64,
    pub failure_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub last_error: Option<String>,
}

impl TaskStats {
    pub(crate) fn new(task: &WarmupTask) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            status: TaskStatus::Registered,
            run_count: 0,
            failure_count: 0,
            last_run: None,
            last_duration: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_task_defaults() {
        let task = WarmupTask::new("t1", "Task one", || async { Ok(()) });

        assert_eq!(task.id, "t1");
        assert_eq!(task.name, "Task one");
        assert_eq!(task.priority, 0);
        assert!(task.timeout.is_none());
        assert!(task.retry.is_none());
        assert!(task.description.is_none());
    }

    #[test]
    fn test_task_builder() {
        let task = WarmupTask::new("t1", "Task one", || async { Ok(()) })
            .with_description("loads things")
            .with_priority(-3)
            .with_timeout(Duration::from_millis(250))
            .with_retry(2, Duration::from_secs(1));

        assert_eq!(task.description.as_deref(), Some("loads things"));
        assert_eq!(task.priority, -3);
        assert_eq!(task.timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            task.retry,
            Some(TaskRetry {
                attempts: 2,
                delay: Duration::from_secs(1)
            })
        );
    }

    #[tokio::test]
    async fn test_task_execute_invokes_routine_each_time() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let task = WarmupTask::new("counter", "Counter", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        task.execute().await.unwrap();
        task.execute().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_task_error_propagates() {
        let task = WarmupTask::new("bad", "Bad", || async { Err("boom".into()) });
        let err = task.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_debug_hides_routine() {
        let task = WarmupTask::new("t1", "Task one", || async { Ok(()) });
        let debug = format!("{:?}", task);
        assert!(debug.contains("t1"));
        assert!(debug.contains(".."));
    }
}
