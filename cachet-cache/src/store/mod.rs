//! Backing store abstraction.
//!
//! The cache keeps all durable state in an external key-value store with
//! per-key TTL, atomic single-key increment and cursor-based pattern scan.
//! [`RedisStore`] talks to Redis; [`MemoryStore`] is an in-process
//! implementation with the same semantics.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Write condition for [`BackingStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Unconditional write
    #[default]
    Always,
    /// Write only if the key does not exist (NX)
    IfAbsent,
    /// Write only if the key already exists (XX)
    IfPresent,
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExpiry {
    /// Key does not exist
    Missing,
    /// Key exists without expiry
    Persistent,
    /// Key expires after the given duration
    ExpiresIn(Duration),
}

impl KeyExpiry {
    /// Remaining lifetime, if the key expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::ExpiresIn(d) => Some(*d),
            _ => None,
        }
    }
}

/// Key-value store consumed by the cache.
///
/// Every method is a single round-trip with atomic single-key semantics.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Store name, for logs.
    fn name(&self) -> &'static str;

    /// Read a string value.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Write a string value. Returns `false` when the condition rejected the write.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> CacheResult<bool>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Set a key's TTL. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove a key's TTL. Returns `false` when nothing changed.
    async fn persist(&self, key: &str) -> CacheResult<bool>;

    /// Remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> CacheResult<KeyExpiry>;

    /// One page of a cursor-driven pattern scan. A returned cursor of 0 ends the scan.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> CacheResult<(u64, Vec<String>)>;

    /// Atomically add `delta` to an integer value, creating it at 0.
    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Push values onto the head of a list, returning the new length.
    async fn lpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64>;

    /// Push values onto the tail of a list, returning the new length.
    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64>;

    /// Pop from the head of a list.
    async fn lpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Pop from the tail of a list.
    async fn rpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// List elements between two inclusive indices; negative indices count from the tail.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<Vec<u8>>>;

    /// List length.
    async fn llen(&self, key: &str) -> CacheResult<u64>;

    /// Add set members, returning how many were new.
    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64>;

    /// Remove set members, returning how many were present.
    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64>;

    /// Check set membership.
    async fn sismember(&self, key: &str, member: &[u8]) -> CacheResult<bool>;

    /// All set members.
    async fn smembers(&self, key: &str) -> CacheResult<Vec<Vec<u8>>>;

    /// Set size.
    async fn scard(&self, key: &str) -> CacheResult<u64>;

    /// Set hash fields.
    async fn hset(&self, key: &str, fields: Vec<(String, String)>) -> CacheResult<()>;

    /// All hash fields; empty when the key does not exist.
    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Release the connection. Later calls fail.
    async fn close(&self) -> CacheResult<()>;
}
