//! Error types for cache operations.

use cachet_warmup::WarmupError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key or pattern has an invalid shape; raised before any store access
    #[error("Validation error: {0}")]
    Validation(String),

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored payload could not be decoded into the requested type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Payload could not be compressed or decompressed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Backing store call failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TTL string could not be parsed
    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    /// Warmup scheduler error
    #[error(transparent)]
    Warmup(#[from] WarmupError),
}

impl CacheError {
    /// Whether this error came from the backing store.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
