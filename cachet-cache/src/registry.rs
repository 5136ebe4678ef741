//! Lazily-created cache instances.
//!
//! A [`CacheRegistry`] owns at most one default [`Cache`] and one
//! [`ExtendedCache`], each with its own store connection. Instances are built
//! on first access; [`CacheRegistry::destroy`] tears them down, and the next
//! access builds fresh ones with no inherited state.

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::extended::ExtendedCache;
use crate::store::{BackingStore, MemoryStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Opens a backing-store connection for a new instance.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &CacheConfig) -> CacheResult<Arc<dyn BackingStore>>;
}

/// Connects every instance to a fresh in-memory store.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryConnector;

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, _config: &CacheConfig) -> CacheResult<Arc<dyn BackingStore>> {
        Ok(Arc::new(MemoryStore::new()))
    }
}

/// Connects every instance to the configured Redis server.
#[cfg(feature = "redis")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[cfg(feature = "redis")]
#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, config: &CacheConfig) -> CacheResult<Arc<dyn BackingStore>> {
        let store = crate::store::RedisStore::connect(&config.redis_url).await?;
        Ok(Arc::new(store))
    }
}

/// Holder for the default and extended cache instances.
pub struct CacheRegistry {
    config: CacheConfig,
    connector: Arc<dyn StoreConnector>,
    default: Mutex<Option<Arc<Cache>>>,
    extended: Mutex<Option<Arc<ExtendedCache>>>,
}

impl CacheRegistry {
    /// Create a registry; no connection is opened until first access.
    pub fn new(config: CacheConfig, connector: impl StoreConnector + 'static) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            default: Mutex::new(None),
            extended: Mutex::new(None),
        }
    }

    /// Registry whose instances use in-memory stores.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, MemoryConnector)
    }

    /// Registry whose instances connect to Redis.
    #[cfg(feature = "redis")]
    pub fn redis(config: CacheConfig) -> Self {
        Self::new(config, RedisConnector)
    }

    /// Configuration instances are built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The default instance, created on first access.
    pub async fn cache(&self) -> CacheResult<Arc<Cache>> {
        let mut slot = self.default.lock().await;
        if let Some(cache) = slot.as_ref() {
            return Ok(cache.clone());
        }

        debug!("Creating default cache instance");
        let store = self.connector.connect(&self.config).await?;
        let cache = Arc::new(Cache::new(store, self.config.clone())?);
        *slot = Some(cache.clone());
        Ok(cache)
    }

    /// The extended instance, created on first access.
    pub async fn extended(&self) -> CacheResult<Arc<ExtendedCache>> {
        let mut slot = self.extended.lock().await;
        if let Some(cache) = slot.as_ref() {
            return Ok(cache.clone());
        }

        debug!("Creating extended cache instance");
        let store = self.connector.connect(&self.config).await?;
        let cache = Arc::new(ExtendedCache::new(store, self.config.clone())?);
        *slot = Some(cache.clone());
        Ok(cache)
    }

    /// Whether either instance currently exists.
    pub async fn is_initialized(&self) -> bool {
        self.default.lock().await.is_some() || self.extended.lock().await.is_some()
    }

    /// Destroy both instances. Handles already given out stay usable only
    /// until their store reports the closed connection.
    pub async fn destroy(&self) -> CacheResult<()> {
        let default = self.default.lock().await.take();
        let extended = self.extended.lock().await.take();

        let default = match default {
            Some(cache) => cache.destroy().await,
            None => Ok(()),
        };
        let extended = match extended {
            Some(cache) => cache.destroy().await,
            None => Ok(()),
        };
        default.and(extended)?;

        info!("Cache registry destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "redis")]
static GLOBAL: once_cell::sync::Lazy<CacheRegistry> = once_cell::sync::Lazy::new(|| {
    let config = CacheConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Invalid cache environment, using defaults");
        CacheConfig::default()
    });
    CacheRegistry::redis(config)
});

/// Process-wide registry configured from the environment, backed by Redis.
#[cfg(feature = "redis")]
pub fn global() -> &'static CacheRegistry {
    &GLOBAL
}
