//! TTL parsing.

use crate::error::{CacheError, CacheResult};
use std::time::Duration;

/// Parse a TTL given either as whole seconds (`"300"`) or as a humantime
/// duration (`"5m"`, `"1h 30m"`).
///
/// # Examples
///
/// ```
/// use cachet_cache::ttl::parse_ttl;
/// use std::time::Duration;
///
/// assert_eq!(parse_ttl("90").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_ttl("1h 30m").unwrap(), Duration::from_secs(5400));
/// ```
pub fn parse_ttl(input: &str) -> CacheResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CacheError::InvalidTtl("empty TTL".to_string()));
    }

    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    humantime::parse_duration(input).map_err(|e| CacheError::InvalidTtl(format!("{input}: {e}")))
}

/// Milliseconds for a store TTL argument.
///
/// Zero stays zero; any other sub-millisecond TTL rounds up to one.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
