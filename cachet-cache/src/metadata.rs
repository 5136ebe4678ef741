//! Metadata records stored beside primary entries.
//!
//! A record is a hash at `<primary>:__meta` with two fields:
//! `compressed` (`"1"`/`"0"`) and `tags` (JSON array). It exists only for
//! entries written with tags or compression, and its TTL always mirrors the
//! primary entry's.

use crate::error::{CacheError, CacheResult};
use crate::key::meta_key;
use crate::store::BackingStore;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const FIELD_COMPRESSED: &str = "compressed";
const FIELD_TAGS: &str = "tags";

/// Side-record for one cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Primary payload is gzip-compressed
    pub compressed: bool,

    /// Tags supplied on the most recent write, duplicates removed
    pub tags: Vec<String>,
}

impl EntryMetadata {
    /// Build a record, dropping duplicate tags but keeping first-seen order.
    pub fn new(compressed: bool, tags: &[String]) -> Self {
        let mut seen = HashSet::new();
        let tags = tags
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();
        Self { compressed, tags }
    }

    /// Whether this entry needs a stored record at all.
    pub fn is_needed(&self) -> bool {
        self.compressed || !self.tags.is_empty()
    }

    /// Whether any of this entry's tags is in `wanted`.
    pub fn has_any_tag(&self, wanted: &HashSet<&str>) -> bool {
        self.tags.iter().any(|t| wanted.contains(t.as_str()))
    }

    fn to_fields(&self) -> CacheResult<Vec<(String, String)>> {
        let tags =
            serde_json::to_string(&self.tags).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let compressed = if self.compressed { "1" } else { "0" };
        Ok(vec![
            (FIELD_COMPRESSED.to_string(), compressed.to_string()),
            (FIELD_TAGS.to_string(), tags),
        ])
    }

    /// Parse a stored hash. An empty hash means no record; an unreadable
    /// tag list reads as no tags.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let compressed = fields
            .get(FIELD_COMPRESSED)
            .is_some_and(|v| v == "1" || v == "true");
        let tags = fields
            .get(FIELD_TAGS)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();
        Some(Self { compressed, tags })
    }
}

/// Read the record for a primary store key.
pub(crate) async fn read(
    store: &dyn BackingStore,
    primary: &str,
) -> CacheResult<Option<EntryMetadata>> {
    let fields = store.hgetall(&meta_key(primary)).await?;
    Ok(EntryMetadata::from_fields(&fields))
}

/// Write the record for a primary store key and align its TTL.
pub(crate) async fn write(
    store: &dyn BackingStore,
    primary: &str,
    metadata: &EntryMetadata,
    ttl: Option<Duration>,
) -> CacheResult<()> {
    let key = meta_key(primary);
    store.hset(&key, metadata.to_fields()?).await?;
    match ttl {
        Some(ttl) => store.expire(&key, ttl).await?,
        None => store.persist(&key).await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyExpiry, MemoryStore};

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_is_needed() {
        assert!(!EntryMetadata::new(false, &[]).is_needed());
        assert!(EntryMetadata::new(true, &[]).is_needed());
        assert!(EntryMetadata::new(false, &tags(&["t"])).is_needed());
    }

    #[test]
    fn test_duplicate_tags_dropped() {
        let meta = EntryMetadata::new(false, &tags(&["a", "b", "a"]));
        assert_eq!(meta.tags, tags(&["a", "b"]));
    }

    #[test]
    fn test_malformed_tags_read_as_empty() {
        let mut fields = HashMap::new();
        fields.insert("compressed".to_string(), "1".to_string());
        fields.insert("tags".to_string(), "not json".to_string());

        let meta = EntryMetadata::from_fields(&fields).unwrap();
        assert!(meta.compressed);
        assert!(meta.tags.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryStore::new();
        let meta = EntryMetadata::new(true, &tags(&["users", "hot"]));
        write(&store, "p:k", &meta, Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(read(&store, "p:k").await.unwrap(), Some(meta));
        assert!(matches!(
            store.ttl("p:k:__meta").await.unwrap(),
            KeyExpiry::ExpiresIn(_)
        ));
        assert_eq!(read(&store, "p:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_without_ttl_persists() {
        let store = MemoryStore::new();
        let meta = EntryMetadata::new(false, &tags(&["t"]));
        write(&store, "k", &meta, Some(Duration::from_secs(30)))
            .await
            .unwrap();
        write(&store, "k", &meta, None).await.unwrap();

        assert_eq!(
            store.ttl("k:__meta").await.unwrap(),
            KeyExpiry::Persistent
        );
    }
}
