//! Cache event notification.
//!
//! Every instance owns one [`EventBus`]. Events reach synchronous observers
//! registered with [`EventBus::on`] first, then broadcast subscribers, in
//! emission order.

use cachet_warmup::WarmupEvent;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// Something observable that happened inside a cache instance.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit {
        key: String,
        namespace: Option<String>,
    },
    Miss {
        key: String,
        namespace: Option<String>,
    },
    Set {
        key: String,
        namespace: Option<String>,
        ttl: Option<Duration>,
        tags: Vec<String>,
        compressed: bool,
    },
    Delete {
        key: String,
        namespace: Option<String>,
        count: u64,
    },
    Clear {
        namespace: Option<String>,
        pattern: Option<String>,
        tags: Vec<String>,
        count: u64,
    },
    Error {
        operation: &'static str,
        key: Option<String>,
        namespace: Option<String>,
        message: String,
    },
    Warmup(WarmupEvent),
}

impl CacheEvent {
    /// Event kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Miss { .. } => "miss",
            Self::Set { .. } => "set",
            Self::Delete { .. } => "delete",
            Self::Clear { .. } => "clear",
            Self::Error { .. } => "error",
            Self::Warmup(_) => "warmup",
        }
    }

    /// Logical key the event concerns, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Hit { key, .. }
            | Self::Miss { key, .. }
            | Self::Set { key, .. }
            | Self::Delete { key, .. } => Some(key),
            Self::Error { key, .. } => key.as_deref(),
            Self::Warmup(event) => Some(&event.task_id),
            Self::Clear { .. } => None,
        }
    }
}

/// Synchronous observer.
pub type CacheListener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Per-instance event dispatcher.
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
    listeners: RwLock<Vec<CacheListener>>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Receive every event emitted from now on.
    ///
    /// A subscriber that falls more than `capacity` events behind sees
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Register a synchronous observer.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Number of observers and subscribers.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len() + self.sender.receiver_count()
    }

    /// Dispatch an event.
    pub fn emit(&self, event: CacheEvent) {
        trace!(kind = event.kind(), key = ?event.key(), "Emitting cache event");

        // Observers may register further observers while being called.
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(&event);
        }

        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.read().len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
