//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use crate::ttl::parse_ttl;
use cachet_warmup::WarmupConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration, applied once when an instance is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backing store URL
    pub redis_url: String,

    /// TTL applied when a write does not specify one
    #[serde(with = "humantime_serde")]
    pub default_ttl: Option<Duration>,

    /// Namespace used when an operation does not specify one
    pub default_namespace: Option<String>,

    /// Prefix prepended to every store key
    pub key_prefix: Option<String>,

    /// Compress serialized values above the threshold
    pub enable_compression: bool,

    /// Serialized size, in bytes, above which values are compressed
    pub compression_threshold: usize,

    /// Run the periodic warmup drain
    pub enable_warmup: bool,

    /// Warmup drain period
    #[serde(with = "humantime_serde")]
    pub warmup_interval: Duration,

    /// Keys requested per SCAN page
    pub scan_page_size: usize,

    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            default_ttl: Some(Duration::from_secs(3600)),
            default_namespace: None,
            key_prefix: Some("cachet".to_string()),
            enable_compression: true,
            compression_threshold: 1024,
            enable_warmup: true,
            warmup_interval: Duration::from_secs(5),
            scan_page_size: 100,
            event_capacity: 1024,
        }
    }
}

impl CacheConfig {
    /// Create a configuration for the given store URL.
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CACHET_REDIS_URL").or_else(|| lookup("REDIS_URL")) {
            config.redis_url = url;
        }

        if let Some(ttl) = lookup("CACHET_DEFAULT_TTL") {
            let ttl = parse_ttl(&ttl)?;
            config.default_ttl = (!ttl.is_zero()).then_some(ttl);
        }

        if let Some(namespace) = lookup("CACHET_NAMESPACE") {
            config.default_namespace = (!namespace.is_empty()).then_some(namespace);
        }

        if let Some(prefix) = lookup("CACHET_KEY_PREFIX") {
            config.key_prefix = (!prefix.is_empty()).then_some(prefix);
        }

        if let Some(flag) = lookup("CACHET_COMPRESSION") {
            config.enable_compression = parse_flag("CACHET_COMPRESSION", &flag)?;
        }

        if let Some(threshold) = lookup("CACHET_COMPRESSION_THRESHOLD") {
            config.compression_threshold = threshold.trim().parse().map_err(|_| {
                CacheError::Config(format!(
                    "CACHET_COMPRESSION_THRESHOLD must be a byte count, got '{threshold}'"
                ))
            })?;
        }

        if let Some(flag) = lookup("CACHET_WARMUP") {
            config.enable_warmup = parse_flag("CACHET_WARMUP", &flag)?;
        }

        if let Some(interval) = lookup("CACHET_WARMUP_INTERVAL") {
            config.warmup_interval = parse_ttl(&interval)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the default TTL. `None` writes entries without expiry.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default namespace.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Drop the key prefix.
    pub fn without_key_prefix(mut self) -> Self {
        self.key_prefix = None;
        self
    }

    /// Enable or disable automatic compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Set the compression threshold in bytes.
    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    /// Enable or disable the periodic warmup drain.
    pub fn with_warmup(mut self, enabled: bool) -> Self {
        self.enable_warmup = enabled;
        self
    }

    /// Set the warmup drain period.
    pub fn with_warmup_interval(mut self, interval: Duration) -> Self {
        self.warmup_interval = interval;
        self
    }

    /// Set the SCAN page size.
    pub fn with_scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }

    /// Check the configuration for values the cache cannot work with.
    pub fn validate(&self) -> CacheResult<()> {
        if self.warmup_interval.is_zero() {
            return Err(CacheError::Config(
                "warmup interval must be greater than zero".to_string(),
            ));
        }
        if self.scan_page_size == 0 {
            return Err(CacheError::Config(
                "scan page size must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(CacheError::Config(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("key prefix", &self.key_prefix),
            ("default namespace", &self.default_namespace),
        ] {
            if let Some(value) = value
                && value.chars().any(|c| c.is_control())
            {
                return Err(CacheError::Config(format!(
                    "{name} must not contain control characters"
                )));
            }
        }
        Ok(())
    }

    /// Scheduler settings derived from this configuration.
    pub fn warmup_config(&self) -> WarmupConfig {
        WarmupConfig::default()
            .with_interval(self.warmup_interval)
            .with_enabled(self.enable_warmup)
    }
}

fn parse_flag(name: &str, value: &str) -> CacheResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CacheError::Config(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.key_prefix.as_deref(), Some("cachet"));
        assert_eq!(config.compression_threshold, 1024);
        assert!(config.enable_compression);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new("redis://cache:6379")
            .with_default_namespace("users")
            .with_key_prefix("app")
            .with_default_ttl(None)
            .with_compression(false)
            .with_warmup_interval(Duration::from_millis(250));

        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.default_namespace.as_deref(), Some("users"));
        assert_eq!(config.key_prefix.as_deref(), Some("app"));
        assert_eq!(config.default_ttl, None);
        assert!(!config.enable_compression);
        assert_eq!(config.warmup_config().interval, Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://fallback:6379"),
            ("CACHET_DEFAULT_TTL", "10m"),
            ("CACHET_NAMESPACE", "sessions"),
            ("CACHET_COMPRESSION", "off"),
            ("CACHET_COMPRESSION_THRESHOLD", "2048"),
            ("CACHET_WARMUP", "false"),
            ("CACHET_WARMUP_INTERVAL", "30"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url, "redis://fallback:6379");
        assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.default_namespace.as_deref(), Some("sessions"));
        assert!(!config.enable_compression);
        assert_eq!(config.compression_threshold, 2048);
        assert!(!config.enable_warmup);
        assert_eq!(config.warmup_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_prefers_cachet_url() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://fallback:6379"),
            ("CACHET_REDIS_URL", "redis://primary:6379"),
        ]))
        .unwrap();
        assert_eq!(config.redis_url, "redis://primary:6379");
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(matches!(
            CacheConfig::from_lookup(lookup(&[("CACHET_COMPRESSION", "maybe")])),
            Err(CacheError::Config(_))
        ));
        assert!(matches!(
            CacheConfig::from_lookup(lookup(&[("CACHET_DEFAULT_TTL", "later")])),
            Err(CacheError::InvalidTtl(_))
        ));
        assert!(matches!(
            CacheConfig::from_lookup(lookup(&[("CACHET_WARMUP_INTERVAL", "0")])),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = CacheConfig::from_lookup(lookup(&[("CACHET_DEFAULT_TTL", "0")])).unwrap();
        assert_eq!(config.default_ttl, None);
    }

    #[test]
    fn test_validate_prefix() {
        let config = CacheConfig::default().with_key_prefix("bad\nprefix");
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_deserialize_with_humantime() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"default_ttl": "5m", "warmup_interval": "2s", "key_prefix": "svc"}"#,
        )
        .unwrap();

        assert_eq!(config.default_ttl, Some(Duration::from_secs(300)));
        assert_eq!(config.warmup_interval, Duration::from_secs(2));
        assert_eq!(config.key_prefix.as_deref(), Some("svc"));
        assert_eq!(config.scan_page_size, 100);
    }
}
