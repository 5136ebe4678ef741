//! Core cache operations.

use crate::codec::{
    JsonSerializer, ValueSerializer, compress, decompress, from_value, should_compress, to_value,
    utf8,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::events::{CacheEvent, EventBus};
use crate::key::{META_SUFFIX, build_key, build_scan_pattern, meta_key, validate_key};
use crate::metadata::{self, EntryMetadata};
use crate::options::{ClearOptions, DelOptions, GetOptions, SetOptions};
use crate::stats::{CacheStats, StatsCounters};
use crate::store::{BackingStore, KeyExpiry, MemoryStore};
use crate::tags;
use cachet_warmup::{WarmupError, WarmupScheduler, WarmupTask};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// A cache instance: one backing store, one warmup scheduler, one event bus.
///
/// Every entry is a primary record plus an optional metadata record holding
/// its compression flag and tags. The two are written, expired and deleted
/// together.
///
/// # Examples
///
/// ```
/// use cachet_cache::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), CacheError> {
/// let cache = Cache::in_memory(CacheConfig::default().with_warmup(false))?;
///
/// cache.set("user:1", &"Alice", SetOptions::new().tags(["users"])).await?;
/// let name: Option<String> = cache.get("user:1", GetOptions::new()).await?;
/// assert_eq!(name.as_deref(), Some("Alice"));
///
/// let removed = cache.clear(ClearOptions::new().tags(["users"])).await?;
/// assert_eq!(removed, 2);
/// # Ok(())
/// # }
/// ```
pub struct Cache {
    store: Arc<dyn BackingStore>,
    config: CacheConfig,
    serializer: Arc<dyn ValueSerializer>,
    stats: StatsCounters,
    events: Arc<EventBus>,
    scheduler: WarmupScheduler,
}

impl Cache {
    /// Create a cache over an existing store.
    ///
    /// Starts the periodic warmup drain when `enable_warmup` is set; outside a
    /// Tokio runtime that fails with [`WarmupError::NoRuntime`].
    pub fn new(store: Arc<dyn BackingStore>, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::new(config.event_capacity));
        let scheduler = WarmupScheduler::with_config(config.warmup_config());
        let bus = events.clone();
        scheduler.on_event(move |event| bus.emit(CacheEvent::Warmup(event.clone())));
        scheduler.start()?;

        info!(
            store = store.name(),
            prefix = ?config.key_prefix,
            namespace = ?config.default_namespace,
            "Cache created"
        );

        Ok(Self {
            store,
            config,
            serializer: Arc::new(JsonSerializer),
            stats: StatsCounters::default(),
            events,
            scheduler,
        })
    }

    /// Create a cache over a fresh in-memory store.
    pub fn in_memory(config: CacheConfig) -> CacheResult<Self> {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Connect to the configured Redis server and create a cache over it.
    #[cfg(feature = "redis")]
    pub async fn connect(config: CacheConfig) -> CacheResult<Self> {
        let store = crate::store::RedisStore::connect(&config.redis_url).await?;
        Self::new(Arc::new(store), config)
    }

    /// Replace the value serializer.
    pub fn with_serializer(mut self, serializer: impl ValueSerializer + 'static) -> Self {
        debug!(serializer = serializer.name(), "Using custom serializer");
        self.serializer = Arc::new(serializer);
        self
    }

    /// Configuration this instance was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// Warmup scheduler owned by this instance.
    pub fn scheduler(&self) -> &WarmupScheduler {
        &self.scheduler
    }

    /// Read a value.
    ///
    /// Returns `default_value` (or `None`) when the key is absent or expired.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        options: GetOptions<T>,
    ) -> CacheResult<Option<T>> {
        validate_key(key)?;
        let namespace = self.namespace(options.namespace.as_deref());
        let store_key = self.store_key(key, namespace);

        let refresh = if options.refresh_ttl {
            self.resolve_ttl(options.ttl)
        } else {
            None
        };
        let found = self
            .fetch(&store_key, refresh)
            .await
            .map_err(|e| self.fail("get", Some(key), namespace, e))?;

        match found {
            Some(value) => {
                self.stats.record_hit();
                debug!(key = %store_key, "Cache hit");
                self.events.emit(CacheEvent::Hit {
                    key: key.to_string(),
                    namespace: namespace.map(str::to_string),
                });
                Ok(Some(value))
            }
            None => {
                self.stats.record_miss();
                debug!(key = %store_key, "Cache miss");
                self.events.emit(CacheEvent::Miss {
                    key: key.to_string(),
                    namespace: namespace.map(str::to_string),
                });
                Ok(options.default_value)
            }
        }
    }

    /// Write a value.
    ///
    /// Returns `false` when an NX/XX condition rejected the write.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> CacheResult<bool> {
        validate_key(key)?;
        let namespace = self.namespace(options.namespace.as_deref());
        let store_key = self.store_key(key, namespace);
        let ttl = self.resolve_ttl(options.ttl);

        let written = self
            .write(&store_key, value, ttl, &options)
            .await
            .map_err(|e| self.fail("set", Some(key), namespace, e))?;

        let Some(metadata) = written else {
            debug!(key = %store_key, condition = ?options.condition, "Conditional write rejected");
            return Ok(false);
        };

        self.stats.record_set();
        debug!(key = %store_key, ttl = ?ttl, compressed = metadata.compressed, "Cache set");
        self.events.emit(CacheEvent::Set {
            key: key.to_string(),
            namespace: namespace.map(str::to_string),
            ttl,
            tags: metadata.tags,
            compressed: metadata.compressed,
        });
        Ok(true)
    }

    /// Delete an entry, or every entry matching a glob when `pattern` is set.
    ///
    /// Returns the number of store keys removed, metadata records included.
    pub async fn del(&self, key: &str, options: DelOptions) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(options.namespace.as_deref());
        let prefix = self.config.key_prefix.as_deref();

        let result = if options.pattern {
            let pattern = build_scan_pattern(key, namespace, prefix);
            tags::delete_matching(self.store.as_ref(), &pattern, self.config.scan_page_size).await
        } else {
            let store_key = build_key(key, namespace, prefix);
            let meta = meta_key(&store_key);
            self.store.delete(&[store_key, meta]).await
        };
        let removed = result.map_err(|e| self.fail("del", Some(key), namespace, e))?;

        if removed > 0 {
            self.stats.record_deletes(removed);
            debug!(key = %key, removed, "Cache delete");
            self.events.emit(CacheEvent::Delete {
                key: key.to_string(),
                namespace: namespace.map(str::to_string),
                count: removed,
            });
        }
        Ok(removed)
    }

    /// Bulk removal by tags, by pattern, or of a whole namespace.
    ///
    /// Returns the number of store keys removed.
    pub async fn clear(&self, options: ClearOptions) -> CacheResult<u64> {
        if let Some(pattern) = &options.pattern {
            validate_key(pattern)?;
        }
        let namespace = self.namespace(options.namespace.as_deref());
        let prefix = self.config.key_prefix.as_deref();
        let page_size = self.config.scan_page_size;

        let result = if options.tags.is_empty() {
            let pattern = options.pattern.as_deref().unwrap_or("*");
            let pattern = build_scan_pattern(pattern, namespace, prefix);
            tags::delete_matching(self.store.as_ref(), &pattern, page_size).await
        } else {
            let pattern = build_scan_pattern(&format!("*{META_SUFFIX}"), namespace, prefix);
            tags::clear_by_tags(self.store.as_ref(), &pattern, &options.tags, page_size).await
        };
        let removed = result.map_err(|e| self.fail("clear", None, namespace, e))?;

        info!(
            namespace = ?namespace,
            pattern = ?options.pattern,
            tags = ?options.tags,
            removed,
            "Cache cleared"
        );
        self.events.emit(CacheEvent::Clear {
            namespace: namespace.map(str::to_string),
            pattern: options.pattern.clone(),
            tags: options.tags.clone(),
            count: removed,
        });
        Ok(removed)
    }

    /// Cache-aside read: return the cached value, or compute, store and
    /// return it.
    ///
    /// Not stampede-proof: concurrent callers that miss together each run
    /// `factory`.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        options: SetOptions,
        factory: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let lookup = GetOptions {
            namespace: options.namespace.clone(),
            ..GetOptions::default()
        };
        if let Some(value) = self.get(key, lookup).await? {
            return Ok(value);
        }

        let value = factory().await?;
        self.set(key, &value, options).await?;
        Ok(value)
    }

    /// Check if a key exists.
    pub async fn has(&self, key: &str, namespace: Option<&str>) -> CacheResult<bool> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        self.store
            .exists(&self.store_key(key, namespace))
            .await
            .map_err(|e| self.fail("has", Some(key), namespace, e))
    }

    /// Remaining lifetime of an entry.
    pub async fn ttl(&self, key: &str, namespace: Option<&str>) -> CacheResult<KeyExpiry> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        self.store
            .ttl(&self.store_key(key, namespace))
            .await
            .map_err(|e| self.fail("ttl", Some(key), namespace, e))
    }

    /// Reset an entry's TTL, metadata record included.
    ///
    /// Returns `false` when the entry does not exist.
    pub async fn expire(
        &self,
        key: &str,
        ttl: Duration,
        namespace: Option<&str>,
    ) -> CacheResult<bool> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.sync_expiry(&store_key, Some(ttl))
            .await
            .map_err(|e| self.fail("expire", Some(key), namespace, e))
    }

    /// Remove an entry's TTL, metadata record included.
    pub async fn persist(&self, key: &str, namespace: Option<&str>) -> CacheResult<bool> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.sync_expiry(&store_key, None)
            .await
            .map_err(|e| self.fail("persist", Some(key), namespace, e))
    }

    /// Tags attached to an entry by its most recent write.
    pub async fn tags_of(&self, key: &str, namespace: Option<&str>) -> CacheResult<Vec<String>> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        let metadata = metadata::read(self.store.as_ref(), &store_key)
            .await
            .map_err(|e| self.fail("tags", Some(key), namespace, e))?;
        Ok(metadata.map(|m| m.tags).unwrap_or_default())
    }

    /// Register a warmup task, replacing any task with the same id.
    pub fn register_warmup_task(&self, task: WarmupTask) {
        self.scheduler.register(task);
    }

    /// Remove a warmup task and any pending run of it.
    pub fn unregister_warmup_task(&self, id: &str) -> bool {
        self.scheduler.unregister(id)
    }

    /// Queue a warmup task. Returns `false` when it was already queued.
    pub fn queue_warmup_task(&self, id: &str, priority: Option<i32>) -> CacheResult<bool> {
        Ok(self.scheduler.queue(id, priority)?)
    }

    /// Run a warmup task now, surfacing its failure.
    pub async fn run_warmup_task(&self, id: &str) -> CacheResult<()> {
        Ok(self.scheduler.run(id).await?)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Register a synchronous event observer.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.events.on(listener);
    }

    /// Stop the warmup scheduler and close the store connection.
    pub async fn destroy(&self) -> CacheResult<()> {
        match self.scheduler.stop() {
            Ok(()) | Err(WarmupError::SchedulerNotRunning) => {}
            Err(e) => return Err(e.into()),
        }
        self.store.close().await?;
        info!(store = self.store.name(), "Cache destroyed");
        Ok(())
    }

    pub(crate) fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> Option<&'a str> {
        namespace.or(self.config.default_namespace.as_deref())
    }

    pub(crate) fn store_key(&self, key: &str, namespace: Option<&str>) -> String {
        build_key(key, namespace, self.config.key_prefix.as_deref())
    }

    /// Effective TTL for a write; zero means no expiry.
    pub(crate) fn resolve_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.config.default_ttl).filter(|ttl| !ttl.is_zero())
    }

    /// Count, report and pass through a failure past validation.
    pub(crate) fn fail(
        &self,
        operation: &'static str,
        key: Option<&str>,
        namespace: Option<&str>,
        err: CacheError,
    ) -> CacheError {
        self.stats.record_error();
        error!(operation, key = ?key, namespace = ?namespace, error = %err, "Cache operation failed");
        self.events.emit(CacheEvent::Error {
            operation,
            key: key.map(str::to_string),
            namespace: namespace.map(str::to_string),
            message: err.to_string(),
        });
        err
    }

    /// Serialize, and compress when asked or above the threshold.
    pub(crate) fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        force: Option<bool>,
    ) -> CacheResult<(Vec<u8>, bool)> {
        let serialized = self.serializer.serialize(&to_value(value)?)?;
        let compressed = force.unwrap_or_else(|| {
            self.config.enable_compression
                && should_compress(&serialized, self.config.compression_threshold)
        });
        let payload = if compressed {
            compress(serialized.as_bytes())?
        } else {
            serialized.into_bytes()
        };
        Ok((payload, compressed))
    }

    pub(crate) fn decode<T: DeserializeOwned>(
        &self,
        raw: Vec<u8>,
        compressed: bool,
    ) -> CacheResult<T> {
        let bytes = if compressed { decompress(&raw)? } else { raw };
        let text = utf8(bytes)?;
        let value = self.serializer.deserialize(&text);
        from_value(value, &text)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        store_key: &str,
        refresh: Option<Duration>,
    ) -> CacheResult<Option<T>> {
        let (raw, metadata) = futures::try_join!(
            self.store.get(store_key),
            metadata::read(self.store.as_ref(), store_key)
        )?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        if let Some(ttl) = refresh {
            self.sync_expiry(store_key, Some(ttl)).await?;
        }

        let compressed = metadata.is_some_and(|m| m.compressed);
        self.decode(raw, compressed).map(Some)
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        store_key: &str,
        value: &T,
        ttl: Option<Duration>,
        options: &SetOptions,
    ) -> CacheResult<Option<EntryMetadata>> {
        let (payload, compressed) = self.encode(value, options.compress)?;
        if !self
            .store
            .set(store_key, payload, ttl, options.condition)
            .await?
        {
            return Ok(None);
        }

        let metadata = EntryMetadata::new(compressed, &options.tags);
        let recorded = if metadata.is_needed() {
            metadata::write(self.store.as_ref(), store_key, &metadata, ttl).await
        } else {
            // Tags from an earlier write must not survive this one.
            self.store.delete(&[meta_key(store_key)]).await.map(|_| ())
        };

        if let Err(e) = recorded {
            // A primary whose metadata record is missing or stale cannot be decoded.
            if let Err(cleanup) = self.store.delete(&[store_key.to_string()]).await {
                warn!(key = %store_key, error = %cleanup, "Failed to remove primary after metadata failure");
            }
            return Err(e);
        }
        Ok(Some(metadata))
    }

    /// Apply a TTL (or none) to a primary record and its metadata record.
    async fn sync_expiry(&self, store_key: &str, ttl: Option<Duration>) -> CacheResult<bool> {
        let meta = meta_key(store_key);
        let (primary, _) = match ttl {
            Some(ttl) => {
                futures::try_join!(
                    self.store.expire(store_key, ttl),
                    self.store.expire(&meta, ttl)
                )?
            }
            None => {
                futures::try_join!(self.store.persist(store_key), self.store.persist(&meta))?
            }
        };
        Ok(primary)
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .field("serializer", &self.serializer.name())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
