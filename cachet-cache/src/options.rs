//! Per-call options for cache operations.

use crate::store::SetCondition;
use std::time::Duration;

/// Options for [`Cache::set`](crate::Cache::set).
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Entry TTL. `None` uses the configured default; zero means no expiry.
    pub ttl: Option<Duration>,

    /// Namespace, overriding the configured default
    pub namespace: Option<String>,

    /// Tags replacing any the entry had before
    pub tags: Vec<String>,

    /// Force compression on or off; `None` applies the size threshold
    pub compress: Option<bool>,

    /// Conditional write
    pub condition: SetCondition,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Store without expiry, ignoring the configured default TTL.
    pub fn no_expiry(mut self) -> Self {
        self.ttl = Some(Duration::ZERO);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Write only if the key does not exist.
    pub fn nx(mut self) -> Self {
        self.condition = SetCondition::IfAbsent;
        self
    }

    /// Write only if the key already exists.
    pub fn xx(mut self) -> Self {
        self.condition = SetCondition::IfPresent;
        self
    }
}

/// Options for [`Cache::get`](crate::Cache::get).
#[derive(Debug, Clone)]
pub struct GetOptions<T> {
    /// Namespace, overriding the configured default
    pub namespace: Option<String>,

    /// Returned on a miss instead of `None`
    pub default_value: Option<T>,

    /// Reset the entry's TTL on a hit
    pub refresh_ttl: bool,

    /// TTL applied by `refresh_ttl`; `None` uses the configured default
    pub ttl: Option<Duration>,
}

impl<T> Default for GetOptions<T> {
    fn default() -> Self {
        Self {
            namespace: None,
            default_value: None,
            refresh_ttl: false,
            ttl: None,
        }
    }
}

impl<T> GetOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn default_value(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Reset the TTL on a hit, to `ttl` or the configured default.
    pub fn refresh_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.refresh_ttl = true;
        self.ttl = ttl;
        self
    }
}

/// Options for [`Cache::del`](crate::Cache::del).
#[derive(Debug, Clone, Default)]
pub struct DelOptions {
    pub namespace: Option<String>,

    /// Treat the key as a glob pattern and delete every match
    pub pattern: bool,
}

impl DelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn pattern(mut self) -> Self {
        self.pattern = true;
        self
    }
}

/// Options for [`Cache::clear`](crate::Cache::clear).
///
/// With tags, removes every entry carrying at least one of them. Otherwise
/// removes every entry matching `pattern` (all entries when absent).
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    pub namespace: Option<String>,
    pub pattern: Option<String>,
    pub tags: Vec<String>,
}

impl ClearOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for counters in [`ExtendedCache`](crate::ExtendedCache).
#[derive(Debug, Clone, Default)]
pub struct CounterOptions {
    pub namespace: Option<String>,

    /// TTL applied after each update
    pub ttl: Option<Duration>,
}

impl CounterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_options_builder() {
        let options = SetOptions::new()
            .ttl(Duration::from_secs(60))
            .namespace("users")
            .tags(["a", "b"])
            .tag("c")
            .compress(true)
            .nx();

        assert_eq!(options.ttl, Some(Duration::from_secs(60)));
        assert_eq!(options.namespace.as_deref(), Some("users"));
        assert_eq!(options.tags, vec!["a", "b", "c"]);
        assert_eq!(options.compress, Some(true));
        assert_eq!(options.condition, SetCondition::IfAbsent);
    }

    #[test]
    fn test_get_options_default_needs_no_bound() {
        struct Opaque;
        let options: GetOptions<Opaque> = GetOptions::default();
        assert!(options.default_value.is_none());
        assert!(!options.refresh_ttl);
    }
}
