//! Derived data structures and batch operations.

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::key::validate_key;
use crate::options::{CounterOptions, DelOptions, GetOptions, SetOptions};
use crate::store::BackingStore;
use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// A [`Cache`] with counters, lists, sets and batch operations.
///
/// Dereferences to [`Cache`], so every core operation is available too.
/// List and set elements go through the value serializer but are never
/// compressed.
pub struct ExtendedCache {
    cache: Cache,
}

impl ExtendedCache {
    /// Create an extended cache over an existing store.
    pub fn new(store: Arc<dyn BackingStore>, config: CacheConfig) -> CacheResult<Self> {
        Ok(Self::from_cache(Cache::new(store, config)?))
    }

    /// Create an extended cache over a fresh in-memory store.
    pub fn in_memory(config: CacheConfig) -> CacheResult<Self> {
        Ok(Self::from_cache(Cache::in_memory(config)?))
    }

    /// Connect to the configured Redis server.
    #[cfg(feature = "redis")]
    pub async fn connect(config: CacheConfig) -> CacheResult<Self> {
        Ok(Self::from_cache(Cache::connect(config).await?))
    }

    /// Wrap an existing cache.
    pub fn from_cache(cache: Cache) -> Self {
        Self { cache }
    }

    /// Unwrap the core cache.
    pub fn into_inner(self) -> Cache {
        self.cache
    }

    /// Atomically add `delta` to a counter, creating it at 0.
    pub async fn increment(
        &self,
        key: &str,
        delta: i64,
        options: CounterOptions,
    ) -> CacheResult<i64> {
        validate_key(key)?;
        let namespace = self.namespace(options.namespace.as_deref());
        let store_key = self.store_key(key, namespace);

        let value = self
            .guarded("increment", key, namespace, async {
                let value = self.store().incr_by(&store_key, delta).await?;
                if let Some(ttl) = options.ttl {
                    self.store().expire(&store_key, ttl).await?;
                }
                Ok(value)
            })
            .await?;

        debug!(key = %store_key, delta, value, "Counter updated");
        Ok(value)
    }

    /// Atomically subtract `delta` from a counter.
    pub async fn decrement(
        &self,
        key: &str,
        delta: i64,
        options: CounterOptions,
    ) -> CacheResult<i64> {
        let negated = delta
            .checked_neg()
            .ok_or_else(|| CacheError::Validation(format!("cannot negate delta {delta}")))?;
        self.increment(key, negated, options).await
    }

    /// Push values onto the head of a list. Returns the new length.
    pub async fn lpush<T: Serialize>(
        &self,
        key: &str,
        values: &[T],
        namespace: Option<&str>,
    ) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("lpush", key, namespace, async {
            let payloads = self.encode_all(values)?;
            self.store().lpush(&store_key, payloads).await
        })
        .await
    }

    /// Push values onto the tail of a list. Returns the new length.
    pub async fn rpush<T: Serialize>(
        &self,
        key: &str,
        values: &[T],
        namespace: Option<&str>,
    ) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("rpush", key, namespace, async {
            let payloads = self.encode_all(values)?;
            self.store().rpush(&store_key, payloads).await
        })
        .await
    }

    /// Pop from the head of a list.
    pub async fn lpop<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> CacheResult<Option<T>> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("lpop", key, namespace, async {
            self.store()
                .lpop(&store_key)
                .await?
                .map(|raw| self.decode(raw, false))
                .transpose()
        })
        .await
    }

    /// Pop from the tail of a list.
    pub async fn rpop<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> CacheResult<Option<T>> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("rpop", key, namespace, async {
            self.store()
                .rpop(&store_key)
                .await?
                .map(|raw| self.decode(raw, false))
                .transpose()
        })
        .await
    }

    /// List elements between two inclusive indices; negative indices count
    /// from the tail, so `(0, -1)` is the whole list.
    pub async fn lrange<T: DeserializeOwned>(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        namespace: Option<&str>,
    ) -> CacheResult<Vec<T>> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("lrange", key, namespace, async {
            let raw = self.store().lrange(&store_key, start, stop).await?;
            self.decode_all(raw)
        })
        .await
    }

    /// List length.
    pub async fn llen(&self, key: &str, namespace: Option<&str>) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("llen", key, namespace, self.store().llen(&store_key))
            .await
    }

    /// Add set members. Returns how many were new.
    pub async fn sadd<T: Serialize>(
        &self,
        key: &str,
        members: &[T],
        namespace: Option<&str>,
    ) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("sadd", key, namespace, async {
            let payloads = self.encode_all(members)?;
            self.store().sadd(&store_key, payloads).await
        })
        .await
    }

    /// Remove set members. Returns how many were present.
    pub async fn srem<T: Serialize>(
        &self,
        key: &str,
        members: &[T],
        namespace: Option<&str>,
    ) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("srem", key, namespace, async {
            let payloads = self.encode_all(members)?;
            self.store().srem(&store_key, payloads).await
        })
        .await
    }

    /// All set members, in no particular order.
    pub async fn smembers<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> CacheResult<Vec<T>> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("smembers", key, namespace, async {
            let raw = self.store().smembers(&store_key).await?;
            self.decode_all(raw)
        })
        .await
    }

    /// Check set membership.
    pub async fn sismember<T: Serialize + ?Sized>(
        &self,
        key: &str,
        member: &T,
        namespace: Option<&str>,
    ) -> CacheResult<bool> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("sismember", key, namespace, async {
            let (payload, _) = self.encode(member, Some(false))?;
            self.store().sismember(&store_key, &payload).await
        })
        .await
    }

    /// Set size.
    pub async fn scard(&self, key: &str, namespace: Option<&str>) -> CacheResult<u64> {
        validate_key(key)?;
        let namespace = self.namespace(namespace);
        let store_key = self.store_key(key, namespace);
        self.guarded("scard", key, namespace, self.store().scard(&store_key))
            .await
    }

    /// Read several keys concurrently. Results keep the order of `keys`.
    pub async fn mget<T, K>(&self, keys: &[K], namespace: Option<&str>) -> CacheResult<Vec<Option<T>>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        try_join_all(keys.iter().map(|key| {
            let options = GetOptions {
                namespace: namespace.map(str::to_string),
                ..GetOptions::default()
            };
            self.get(key.as_ref(), options)
        }))
        .await
    }

    /// Write several entries concurrently with shared options. Returns how
    /// many writes were accepted.
    pub async fn mset<T, K>(&self, entries: &[(K, T)], options: SetOptions) -> CacheResult<u64>
    where
        T: Serialize,
        K: AsRef<str>,
    {
        let written = try_join_all(
            entries
                .iter()
                .map(|(key, value)| self.set(key.as_ref(), value, options.clone())),
        )
        .await?;
        Ok(written.into_iter().filter(|ok| *ok).count() as u64)
    }

    /// Delete several keys concurrently. Returns the number of store keys
    /// removed.
    pub async fn mdel<K: AsRef<str>>(&self, keys: &[K], namespace: Option<&str>) -> CacheResult<u64> {
        let removed = try_join_all(keys.iter().map(|key| {
            let options = DelOptions {
                namespace: namespace.map(str::to_string),
                pattern: false,
            };
            self.del(key.as_ref(), options)
        }))
        .await?;
        Ok(removed.into_iter().sum())
    }

    async fn guarded<R>(
        &self,
        operation: &'static str,
        key: &str,
        namespace: Option<&str>,
        fut: impl Future<Output = CacheResult<R>>,
    ) -> CacheResult<R> {
        fut.await
            .map_err(|e| self.fail(operation, Some(key), namespace, e))
    }

    fn encode_all<T: Serialize>(&self, values: &[T]) -> CacheResult<Vec<Vec<u8>>> {
        values
            .iter()
            .map(|v| self.encode(v, Some(false)).map(|(payload, _)| payload))
            .collect()
    }

    fn decode_all<T: DeserializeOwned>(&self, raw: Vec<Vec<u8>>) -> CacheResult<Vec<T>> {
        raw.into_iter().map(|r| self.decode(r, false)).collect()
    }
}

impl Deref for ExtendedCache {
    type Target = Cache;

    fn deref(&self) -> &Cache {
        &self.cache
    }
}

impl std::fmt::Debug for ExtendedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExtendedCache").field(&self.cache).finish()
    }
}
