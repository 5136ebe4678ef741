//! Tag-indexed invalidation.
//!
//! There is no inverted index. Tag membership is recovered by scanning the
//! metadata records in scope page by page and checking each record's tag
//! list, so an invalidation costs O(metadata keys in scope). A tag written
//! concurrently with a running scan may be missed if the write lands behind
//! the cursor.

use crate::error::CacheResult;
use crate::key::{meta_key, primary_key};
use crate::metadata::EntryMetadata;
use crate::store::BackingStore;
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Delete every entry whose metadata record under `meta_pattern` carries at
/// least one of `tags`. Returns the number of store keys removed, primary
/// and metadata records combined.
pub(crate) async fn clear_by_tags(
    store: &dyn BackingStore,
    meta_pattern: &str,
    tags: &[String],
    page_size: usize,
) -> CacheResult<u64> {
    let wanted: HashSet<&str> = tags.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return Ok(0);
    }

    let mut seen = HashSet::new();
    let mut doomed = BTreeSet::new();
    let mut cursor = 0;
    let mut pages = 0usize;

    loop {
        let (next, keys) = store.scan(cursor, meta_pattern, page_size).await?;
        pages += 1;

        // SCAN may return a key more than once; read each record once.
        let fresh: Vec<String> = keys
            .into_iter()
            .filter(|k| primary_key(k).is_some() && seen.insert(k.clone()))
            .collect();
        let records = try_join_all(fresh.iter().map(|k| store.hgetall(k))).await?;

        for (key, fields) in fresh.iter().zip(records) {
            let Some(metadata) = EntryMetadata::from_fields(&fields) else {
                continue;
            };
            if metadata.has_any_tag(&wanted)
                && let Some(primary) = primary_key(key)
            {
                doomed.insert(primary.to_string());
                doomed.insert(key.clone());
            }
        }

        if next == 0 {
            break;
        }
        cursor = next;
    }

    debug!(
        pattern = %meta_pattern,
        pages,
        records = seen.len(),
        matched = doomed.len(),
        "Tag scan complete"
    );
    delete_batch(store, doomed).await
}

/// Delete every store key matching `pattern` together with its metadata
/// record. Returns the number of store keys removed.
pub(crate) async fn delete_matching(
    store: &dyn BackingStore,
    pattern: &str,
    page_size: usize,
) -> CacheResult<u64> {
    let mut doomed = BTreeSet::new();
    let mut cursor = 0;

    loop {
        let (next, keys) = store.scan(cursor, pattern, page_size).await?;
        for key in keys {
            match primary_key(&key) {
                Some(primary) => doomed.insert(primary.to_string()),
                None => doomed.insert(meta_key(&key)),
            };
            doomed.insert(key);
        }

        if next == 0 {
            break;
        }
        cursor = next;
    }

    debug!(pattern = %pattern, keys = doomed.len(), "Pattern scan complete");
    delete_batch(store, doomed).await
}

async fn delete_batch(store: &dyn BackingStore, keys: BTreeSet<String>) -> CacheResult<u64> {
    if keys.is_empty() {
        return Ok(0);
    }
    let keys: Vec<String> = keys.into_iter().collect();
    store.delete(&keys).await
}
