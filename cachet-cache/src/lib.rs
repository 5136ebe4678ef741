//! Tag-aware caching layer for cachet.
//!
//! Adds namespacing, tag-based bulk invalidation, optional compression,
//! pluggable serialization, cache-aside reads, statistics, events and a
//! warmup scheduler on top of a key-value store with native TTL and
//! pattern scan.
//!
//! # Features
//!
//! - `redis` - Redis backing store (enabled by default)
//! - **Tag-based invalidation** - Remove every entry carrying a tag
//! - **Compression** - gzip above a size threshold, or on request
//! - **Warmup** - Prioritized background routines that pre-populate entries
//! - **Derived structures** - Counters, lists and sets on [`ExtendedCache`]
//!
//! # Examples
//!
//! ## Redis Cache
//!
//! ```no_run
//! use cachet_cache::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let cache = Cache::connect(CacheConfig::new("redis://localhost:6379")).await?;
//!
//!     cache
//!         .set("user:1", &"Alice", SetOptions::new().ttl(Duration::from_secs(60)))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Tag-based Invalidation
//!
//! ```
//! use cachet_cache::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), CacheError> {
//! let cache = Cache::in_memory(CacheConfig::default().with_warmup(false))?;
//!
//! cache.set("a", &1, SetOptions::new().tags(["t"])).await?;
//! cache.set("b", &2, SetOptions::new().tags(["t", "u"])).await?;
//!
//! // Removes both entries and their metadata records
//! let removed = cache.clear(ClearOptions::new().tags(["t"])).await?;
//! assert_eq!(removed, 4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Warmup
//!
//! ```no_run
//! use cachet_cache::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), CacheError> {
//! let cache = Arc::new(Cache::connect(CacheConfig::from_env()?).await?);
//!
//! let warm = cache.clone();
//! cache.register_warmup_task(
//!     WarmupTask::new("top-users", "Top users", move || {
//!         let cache = warm.clone();
//!         async move {
//!             cache.set("top-users", &vec![1, 2, 3], SetOptions::new()).await?;
//!             Ok(())
//!         }
//!     })
//!     .with_priority(10)
//!     .with_timeout(Duration::from_secs(5)),
//! );
//!
//! cache.queue_warmup_task("top-users", None)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod extended;
pub mod key;
pub mod metadata;
pub mod options;
pub mod registry;
pub mod retry;
pub mod stats;
pub mod store;
pub mod tags;
pub mod ttl;

pub use cache::Cache;
pub use codec::{JsonSerializer, ValueSerializer};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use events::{CacheEvent, CacheListener, EventBus};
pub use extended::ExtendedCache;
pub use metadata::EntryMetadata;
pub use options::{ClearOptions, CounterOptions, DelOptions, GetOptions, SetOptions};
pub use registry::{CacheRegistry, MemoryConnector, StoreConnector};
pub use retry::{Backoff, RetryPolicy};
pub use stats::CacheStats;
pub use store::{BackingStore, KeyExpiry, MemoryStore, SetCondition};
pub use ttl::parse_ttl;

pub use cachet_warmup::{WarmupError, WarmupEvent, WarmupStatus, WarmupTask};

#[cfg(feature = "redis")]
pub use registry::{RedisConnector, global};
#[cfg(feature = "redis")]
pub use store::RedisStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::Cache;
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::events::CacheEvent;
    pub use crate::extended::ExtendedCache;
    pub use crate::options::{ClearOptions, CounterOptions, DelOptions, GetOptions, SetOptions};
    pub use crate::registry::CacheRegistry;
    pub use crate::stats::CacheStats;
    pub use crate::store::{BackingStore, MemoryStore};

    #[cfg(feature = "redis")]
    pub use crate::store::RedisStore;
}
