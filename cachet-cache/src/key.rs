//! Key formatting and validation.
//!
//! Store keys are `prefix:namespace:key`, with absent or empty parts
//! skipped rather than left as empty segments. A metadata record lives next
//! to its primary entry under `<primary>:__meta`.

use crate::error::{CacheError, CacheResult};

/// Separator between key segments.
pub const DELIMITER: char = ':';

/// Suffix marking a metadata record key.
pub const META_SUFFIX: &str = ":__meta";

/// Longest accepted logical key, in characters.
pub const MAX_KEY_LENGTH: usize = 250;

const FORBIDDEN: [char; 4] = ['\r', '\n', '\t', '\0'];

/// Check a logical key before it reaches the store.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::Validation("key must not be empty".to_string()));
    }

    let length = key.chars().count();
    if length > MAX_KEY_LENGTH {
        return Err(CacheError::Validation(format!(
            "key length {length} exceeds {MAX_KEY_LENGTH} characters"
        )));
    }

    if let Some(c) = key.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(CacheError::Validation(format!(
            "key contains forbidden character {c:?}"
        )));
    }

    if key.ends_with(META_SUFFIX) {
        return Err(CacheError::Validation(format!(
            "key must not end with reserved suffix '{META_SUFFIX}'"
        )));
    }

    Ok(())
}

/// Join prefix, namespace and key, skipping absent or empty parts.
///
/// # Examples
///
/// ```
/// use cachet_cache::key::build_key;
///
/// assert_eq!(build_key("user:1", Some("users"), Some("app")), "app:users:user:1");
/// assert_eq!(build_key("user:1", None, Some("app")), "app:user:1");
/// assert_eq!(build_key("user:1", Some(""), None), "user:1");
/// ```
pub fn build_key(key: &str, namespace: Option<&str>, prefix: Option<&str>) -> String {
    let mut out = String::with_capacity(
        key.len() + namespace.map_or(0, str::len) + prefix.map_or(0, str::len) + 2,
    );
    for part in [prefix, namespace].into_iter().flatten() {
        if !part.is_empty() {
            out.push_str(part);
            out.push(DELIMITER);
        }
    }
    out.push_str(key);
    out
}

/// Same joining rule as [`build_key`], applied to a glob pattern.
///
/// Only `pattern` is matched as a glob; glob metacharacters in the prefix and
/// namespace are escaped so they match literally.
///
/// ```
/// use cachet_cache::key::build_scan_pattern;
///
/// assert_eq!(build_scan_pattern("*", Some("a*"), Some("app")), r"app:a\*:*");
/// ```
pub fn build_scan_pattern(pattern: &str, namespace: Option<&str>, prefix: Option<&str>) -> String {
    let prefix = prefix.map(escape_glob);
    let namespace = namespace.map(escape_glob);
    build_key(pattern, namespace.as_deref(), prefix.as_deref())
}

/// Backslash-escape `*`, `?`, `[`, `]` and `\` so a segment matches literally.
pub fn escape_glob(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Metadata record key for a primary store key.
pub fn meta_key(primary: &str) -> String {
    format!("{primary}{META_SUFFIX}")
}

/// Whether a store key is a metadata record key.
pub fn is_meta_key(key: &str) -> bool {
    key.ends_with(META_SUFFIX)
}

/// Primary store key for a metadata record key.
pub fn primary_key(meta: &str) -> Option<&str> {
    meta.strip_suffix(META_SUFFIX)
}
