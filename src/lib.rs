// cachet - tag-aware caching over Redis
//
// This library layers namespacing, tag-based invalidation, compression,
// statistics, events and a prioritized warmup scheduler on top of a
// key-value store with native TTL and pattern scan.

pub mod logging;

// Re-export member crates
#[cfg(feature = "cache")]
pub use cachet_cache;

#[cfg(feature = "warmup")]
pub use cachet_warmup;

#[cfg(feature = "cache")]
pub use cachet_cache::{
    Cache, CacheConfig, CacheError, CacheEvent, CacheRegistry, CacheResult, CacheStats,
    ClearOptions, CounterOptions, DelOptions, ExtendedCache, GetOptions, MemoryStore, SetOptions,
};

#[cfg(feature = "warmup")]
pub use cachet_warmup::{WarmupError, WarmupEvent, WarmupScheduler, WarmupStatus, WarmupTask};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::logging::LogConfig;

    #[cfg(feature = "cache")]
    pub use cachet_cache::prelude::*;

    #[cfg(feature = "warmup")]
    pub use cachet_warmup::prelude::*;
}
