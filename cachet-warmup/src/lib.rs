//! Warmup task scheduling for cachet.
//!
//! Proactively populates cache entries through registered routines:
//! - Task registry keyed by id
//! - Priority queue with idempotent enqueue
//! - Periodic, single-flight drain step
//! - Per-task timeout
//! - Lifecycle events for observers
//! - Bounded re-queue on failure
//!
//! ## Quick Start
//!
//! ```no_run
//! use cachet_warmup::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WarmupError> {
//!     let scheduler = WarmupScheduler::with_config(
//!         WarmupConfig::default().with_interval(Duration::from_secs(1)),
//!     );
//!
//!     scheduler.on_event(|event| println!("{} -> {}", event.task_id, event.status.as_str()));
//!
//!     scheduler.register(
//!         WarmupTask::new("top-users", "Top users", || async {
//!             // fetch from the database and write to the cache
//!             Ok(())
//!         })
//!         .with_priority(10)
//!         .with_timeout(Duration::from_secs(5)),
//!     );
//!
//!     scheduler.queue("top-users", None)?;
//!     scheduler.start()?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod scheduler;
pub mod task;

pub use error::{TaskError, WarmupError, WarmupResult};
pub use event::{WarmupEvent, WarmupListener, WarmupStatus};
pub use scheduler::{WarmupConfig, WarmupScheduler};
pub use task::{TaskFn, TaskFuture, TaskRetry, TaskStats, TaskStatus, WarmupTask};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{TaskError, WarmupError, WarmupResult};
    pub use crate::event::{WarmupEvent, WarmupStatus};
    pub use crate::scheduler::{WarmupConfig, WarmupScheduler};
    pub use crate::task::{TaskStats, TaskStatus, WarmupTask};
}
