//! Redis backing store.

use super::{BackingStore, KeyExpiry, SetCondition};
use crate::error::{CacheError, CacheResult};
use crate::ttl::ttl_millis;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Redis store over a multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    closed: Arc<AtomicBool>,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cachet_cache::{CacheError, RedisStore};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let store = RedisStore::connect("redis://localhost:6379").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url).map_err(|e| CacheError::Config(e.to_string()))?;
        let connection = ConnectionManager::new(client).await?;
        debug!(url = %url, "Connected to Redis");

        Ok(Self {
            connection,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn conn(&self) -> CacheResult<ConnectionManager> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Store("store is closed".to_string()));
        }
        Ok(self.connection.clone())
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX rejects 0; one millisecond expires just as promptly.
            cmd.arg("PX").arg(ttl_millis(ttl).max(1));
        }
        match condition {
            SetCondition::Always => {}
            SetCondition::IfAbsent => {
                cmd.arg("NX");
            }
            SetCondition::IfPresent => {
                cmd.arg("XX");
            }
        }

        // A rejected NX/XX write replies nil.
        let reply: redis::Value = cmd.query_async(&mut conn).await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        // PEXPIRE 0 deletes the key.
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let updated: i64 = redis::cmd("PERSIST")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyExpiry> {
        let mut conn = self.conn()?;
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(match millis {
            -2 => KeyExpiry::Missing,
            ms if ms < 0 => KeyExpiry::Persistent,
            ms => KeyExpiry::ExpiresIn(Duration::from_millis(ms as u64)),
        })
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.conn()?;
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.conn()?;
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn lpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let len: u64 = redis::cmd("LPUSH")
            .arg(key)
            .arg(values)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let len: u64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(values)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn lpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = redis::cmd("LPOP").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn rpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = redis::cmd("RPOP").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<Vec<u8>>> {
        let mut conn = self.conn()?;
        let values: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await?;
        Ok(added)
    }

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let removed: u64 = redis::cmd("SREM")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let present: bool = conn.sismember(key, member).await?;
        Ok(present)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<Vec<u8>>> {
        let mut conn = self.conn()?;
        let members: Vec<Vec<u8>> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn scard(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.conn()?;
        let size: u64 = conn.scard(key).await?;
        Ok(size)
    }

    async fn hset(&self, key: &str, fields: Vec<(String, String)>) -> CacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in &fields {
            cmd.arg(field).arg(value);
        }
        let _: u64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn()?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Redis store closed");
        Ok(())
    }
}
