//! Warmup task scheduler.

use crate::error::{WarmupError, WarmupResult};
use crate::event::{WarmupEvent, WarmupListener, WarmupStatus};
use crate::task::{TaskStats, TaskStatus, WarmupTask};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    /// Period of the drain step
    pub interval: Duration,

    /// Whether `start` launches the periodic drain loop
    pub enabled: bool,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            enabled: true,
        }
    }
}

impl WarmupConfig {
    /// Set the drain period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enable or disable the periodic drain loop.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Entry in the pending queue.
struct QueuedTask {
    task: Arc<WarmupTask>,
    priority: i32,
    /// Re-queues already spent on this task
    attempt: u32,
    not_before: Option<Instant>,
}

impl QueuedTask {
    fn is_ready(&self, now: Instant) -> bool {
        self.not_before.is_none_or(|at| at <= now)
    }

    /// Drain order: higher priority first, then ascending id.
    fn runs_before(&self, other: &QueuedTask) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.task.id < other.task.id)
    }
}

struct Inner {
    tasks: RwLock<HashMap<String, Arc<WarmupTask>>>,
    pending: Mutex<Vec<QueuedTask>>,
    stats: Mutex<HashMap<String, TaskStats>>,
    listeners: RwLock<Vec<WarmupListener>>,
    /// Held for the whole of a drain step; a second drain finding it taken is a no-op.
    drain_slot: tokio::sync::Mutex<()>,
}

/// Prioritized warmup scheduler.
///
/// Tasks are registered once and queued any number of times. A periodic
/// drain step takes the single highest-priority ready task from the pending
/// queue and runs it; at most one drain is in flight at a time, so at most
/// one queued task body executes at any instant.
pub struct WarmupScheduler {
    inner: Arc<Inner>,
    config: WarmupConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WarmupScheduler {
    /// Create a new scheduler with default configuration.
    pub fn new() -> Self {
        Self::with_config(WarmupConfig::default())
    }

    /// Create a new scheduler with custom configuration.
    pub fn with_config(config: WarmupConfig) -> Self {
        debug!(
            interval = ?config.interval,
            enabled = config.enabled,
            "Initializing warmup scheduler"
        );
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                pending: Mutex::new(Vec::new()),
                stats: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                drain_slot: tokio::sync::Mutex::new(()),
            }),
            config,
            handle: Mutex::new(None),
        }
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    /// Register an observer for lifecycle events.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&WarmupEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Arc::new(listener));
    }

    /// Register a task, replacing any task with the same id.
    pub fn register(&self, task: WarmupTask) {
        let task = Arc::new(task);
        debug!(task_id = %task.id, priority = task.priority, "Registering warmup task");

        self.inner
            .stats
            .lock()
            .insert(task.id.clone(), TaskStats::new(&task));
        self.inner
            .tasks
            .write()
            .insert(task.id.clone(), task.clone());

        self.inner.emit(&task, WarmupStatus::Registered);
    }

    /// Remove a task from the registry and the pending queue.
    ///
    /// Returns `false` when no task was registered under `id`.
    pub fn unregister(&self, id: &str) -> bool {
        let Some(task) = self.inner.tasks.write().remove(id) else {
            return false;
        };

        self.inner.pending.lock().retain(|q| q.task.id != id);
        self.inner.stats.lock().remove(id);

        debug!(task_id = %id, "Unregistered warmup task");
        self.inner.emit(&task, WarmupStatus::Unregistered);
        true
    }

    /// Queue a registered task for the next drain.
    ///
    /// Returns `Ok(false)` when the task is already waiting in the queue.
    pub fn queue(&self, id: &str, priority: Option<i32>) -> WarmupResult<bool> {
        let task = self.inner.task(id)?;
        let priority = priority.unwrap_or(task.priority);

        {
            let mut pending = self.inner.pending.lock();
            if pending.iter().any(|q| q.task.id == id) {
                trace!(task_id = %id, "Warmup task already queued");
                return Ok(false);
            }
            pending.push(QueuedTask {
                task: task.clone(),
                priority,
                attempt: 0,
                not_before: None,
            });
        }

        self.inner.set_status(id, TaskStatus::Queued);
        self.inner.emit(&task, WarmupStatus::Queued { priority });
        Ok(true)
    }

    /// Run a registered task now, bypassing the queue.
    ///
    /// The task's failure, including a timeout, is returned to the caller.
    pub async fn run(&self, id: &str) -> WarmupResult<()> {
        let task = self.inner.task(id)?;
        self.inner.execute(task).await
    }

    /// Run one drain step now.
    ///
    /// Returns the id of the executed task, or `None` when the queue had no
    /// ready task or another drain was already in flight.
    pub async fn drain(&self) -> Option<String> {
        self.inner.drain().await
    }

    /// Start the periodic drain loop.
    ///
    /// Does nothing when the scheduler is configured as disabled.
    pub fn start(&self) -> WarmupResult<()> {
        if !self.config.enabled {
            debug!("Warmup disabled, periodic drain not started");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WarmupError::NoRuntime)?;

        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Warmup scheduler already running");
            return Err(WarmupError::SchedulerAlreadyRunning);
        }

        let inner = self.inner.clone();
        let period = self.config.interval;

        *handle = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let inner = inner.clone();
                tokio::spawn(async move {
                    inner.drain().await;
                });
            }
        }));

        info!(interval = ?period, "Warmup scheduler started");
        Ok(())
    }

    /// Stop the periodic drain loop.
    ///
    /// A drain already in flight runs to completion.
    pub fn stop(&self) -> WarmupResult<()> {
        let handle = self
            .handle
            .lock()
            .take()
            .ok_or(WarmupError::SchedulerNotRunning)?;
        handle.abort();
        info!("Warmup scheduler stopped");
        Ok(())
    }

    /// Check if the periodic drain loop is running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Ids of all registered tasks, sorted.
    pub fn list_tasks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.tasks.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of queued tasks in drain order.
    pub fn pending(&self) -> Vec<String> {
        let pending = self.inner.pending.lock();
        let mut order: Vec<&QueuedTask> = pending.iter().collect();
        order.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.task.id.cmp(&b.task.id))
        });
        order.into_iter().map(|q| q.task.id.clone()).collect()
    }

    /// Check if a task is waiting in the pending queue.
    pub fn is_queued(&self, id: &str) -> bool {
        self.inner.pending.lock().iter().any(|q| q.task.id == id)
    }

    /// Get task statistics.
    pub fn task_stats(&self, id: &str) -> WarmupResult<TaskStats> {
        self.inner
            .stats
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| WarmupError::TaskNotFound(id.to_string()))
    }
}

impl Default for WarmupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WarmupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

impl Inner {
    fn task(&self, id: &str) -> WarmupResult<Arc<WarmupTask>> {
        self.tasks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| WarmupError::TaskNotFound(id.to_string()))
    }

    fn emit(&self, task: &WarmupTask, status: WarmupStatus) {
        trace!(task_id = %task.id, status = status.as_str(), "Warmup lifecycle event");
        let event = WarmupEvent::new(&task.id, &task.name, status);
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    fn set_status(&self, id: &str, status: TaskStatus) {
        if let Some(stats) = self.stats.lock().get_mut(id) {
            stats.status = status;
        }
    }

    fn take_next(&self) -> Option<QueuedTask> {
        let mut pending = self.pending.lock();
        let now = Instant::now();

        let mut best: Option<usize> = None;
        for (idx, candidate) in pending.iter().enumerate() {
            if !candidate.is_ready(now) {
                continue;
            }
            if best.is_none_or(|b| candidate.runs_before(&pending[b])) {
                best = Some(idx);
            }
        }

        best.map(|idx| pending.remove(idx))
    }

    async fn drain(self: &Arc<Self>) -> Option<String> {
        let Ok(_slot) = self.drain_slot.try_lock() else {
            trace!("Warmup drain already in flight, skipping tick");
            return None;
        };

        let queued = self.take_next()?;
        let id = queued.task.id.clone();

        if let Err(error) = self.execute(queued.task.clone()).await {
            self.requeue_after_failure(queued, &error);
        }

        Some(id)
    }

    fn requeue_after_failure(&self, queued: QueuedTask, error: &WarmupError) {
        let Some(retry) = queued.task.retry else {
            return;
        };
        if queued.attempt >= retry.attempts {
            warn!(
                task_id = %queued.task.id,
                attempts = queued.attempt,
                error = %error,
                "Warmup task retries exhausted"
            );
            return;
        }
        if !self.tasks.read().contains_key(&queued.task.id) {
            return;
        }

        let attempt = queued.attempt + 1;
        {
            let mut pending = self.pending.lock();
            if pending.iter().any(|q| q.task.id == queued.task.id) {
                return;
            }
            pending.push(QueuedTask {
                task: queued.task.clone(),
                priority: queued.priority,
                attempt,
                not_before: Some(Instant::now() + retry.delay),
            });
        }

        self.set_status(&queued.task.id, TaskStatus::Queued);
        self.emit(
            &queued.task,
            WarmupStatus::Retrying {
                attempt,
                delay: retry.delay,
            },
        );
    }

    async fn execute(&self, task: Arc<WarmupTask>) -> WarmupResult<()> {
        self.set_status(&task.id, TaskStatus::Running);
        self.emit(&task, WarmupStatus::Started);
        debug!(task_id = %task.id, "Executing warmup task");

        let started = Instant::now();
        let mut body = tokio::spawn(task.execute());

        let joined = match task.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut body).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    body.abort();
                    None
                }
            },
            None => Some(body.await),
        };

        let result = match joined {
            None => Err(WarmupError::Timeout {
                task_id: task.id.clone(),
                timeout: task.timeout.unwrap_or_default(),
            }),
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(WarmupError::ExecutionFailed {
                task_id: task.id.clone(),
                message: e.to_string(),
            }),
            Some(Err(e)) if e.is_panic() => Err(WarmupError::Panicked {
                task_id: task.id.clone(),
            }),
            Some(Err(e)) => Err(WarmupError::ExecutionFailed {
                task_id: task.id.clone(),
                message: e.to_string(),
            }),
        };

        self.finish(&task, started.elapsed(), result)
    }

    fn finish(
        &self,
        task: &WarmupTask,
        duration: Duration,
        result: WarmupResult<()>,
    ) -> WarmupResult<()> {
        if let Some(stats) = self.stats.lock().get_mut(&task.id) {
            stats.run_count += 1;
            stats.last_run = Some(Utc::now());
            stats.last_duration = Some(duration);
            match &result {
                Ok(()) => {
                    stats.status = TaskStatus::Completed;
                    stats.last_error = None;
                }
                Err(e) => {
                    stats.failure_count += 1;
                    stats.status = TaskStatus::Failed(e.to_string());
                    stats.last_error = Some(e.to_string());
                }
            }
        }

        match &result {
            Ok(()) => {
                debug!(task_id = %task.id, ?duration, "Warmup task completed");
                self.emit(task, WarmupStatus::Completed { duration });
            }
            Err(error) => {
                warn!(task_id = %task.id, ?duration, error = %error, "Warmup task failed");
                self.emit(
                    task,
                    WarmupStatus::Failed {
                        duration,
                        error: error.clone(),
                    },
                );
            }
        }

        result
    }
}
