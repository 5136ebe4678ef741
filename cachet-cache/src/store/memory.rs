//! In-process backing store.

use super::{BackingStore, KeyExpiry, SetCondition};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum StoredValue {
    Bytes(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: StoredValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct MemoryInner {
    data: Mutex<HashMap<String, Entry>>,
    closed: AtomicBool,
}

/// In-memory store with Redis-compatible semantics.
///
/// Expiry uses tokio's clock, so tests running with paused time can
/// advance past a TTL deterministically. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .data
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of live keys.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .inner
            .data
            .lock()
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_open(&self) -> CacheResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Store("store is closed".to_string()));
        }
        Ok(())
    }

    /// Run `f` against the live entry for `key`, dropping it first if expired.
    fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> CacheResult<R> {
        self.check_open()?;
        let mut data = self.inner.data.lock();
        let now = Instant::now();
        if data.get(key).is_some_and(|e| e.is_expired(now)) {
            data.remove(key);
        }
        Ok(f(&mut data))
    }

    fn push(&self, key: &str, values: Vec<Vec<u8>>, front: bool) -> CacheResult<u64> {
        self.with_entry(key, |data| {
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(StoredValue::List(VecDeque::new())));
            let StoredValue::List(list) = &mut entry.value else {
                return Err(wrong_type());
            };
            for value in values {
                if front {
                    list.push_front(value);
                } else {
                    list.push_back(value);
                }
            }
            Ok(list.len() as u64)
        })?
    }

    fn pop(&self, key: &str, front: bool) -> CacheResult<Option<Vec<u8>>> {
        self.with_entry(key, |data| {
            let Some(entry) = data.get_mut(key) else {
                return Ok(None);
            };
            let StoredValue::List(list) = &mut entry.value else {
                return Err(wrong_type());
            };
            let value = if front { list.pop_front() } else { list.pop_back() };
            if list.is_empty() {
                data.remove(key);
            }
            Ok(value)
        })?
    }
}

fn wrong_type() -> CacheError {
    CacheError::Store(WRONG_TYPE.to_string())
}

/// Resolve Redis-style inclusive range bounds against a length.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Glob matching with `*`, `?`, `[...]` classes and backslash escapes.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_from(&pattern, &text)
}

fn glob_match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point for the most recent `*`.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t])
                        && matched
                    {
                        p = next;
                        t += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match one character against the class starting at `pattern[start] == '['`.
/// Returns whether it matched and the index just past the class.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            i += 1;
            matched |= pattern[i] == c;
            i += 1;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }
    if i >= pattern.len() {
        // Unterminated class
        return None;
    }
    Some((matched != negate, i + 1))
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(None),
            Some(Entry {
                value: StoredValue::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> CacheResult<bool> {
        self.with_entry(key, |data| {
            let exists = data.contains_key(key);
            match condition {
                SetCondition::IfAbsent if exists => return false,
                SetCondition::IfPresent if !exists => return false,
                _ => {}
            }
            data.insert(
                key.to_string(),
                Entry {
                    value: StoredValue::Bytes(value),
                    expires_at: ttl.map(|ttl| Instant::now() + ttl),
                },
            );
            true
        })
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.check_open()?;
        let now = Instant::now();
        let mut data = self.inner.data.lock();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = data.remove(key)
                && !entry.is_expired(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.with_entry(key, |data| data.contains_key(key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.with_entry(key, |data| {
            if ttl.is_zero() {
                return data.remove(key).is_some();
            }
            match data.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(Instant::now() + ttl);
                    true
                }
                None => false,
            }
        })
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        self.with_entry(key, |data| {
            data.get_mut(key)
                .is_some_and(|entry| entry.expires_at.take().is_some())
        })
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyExpiry> {
        self.with_entry(key, |data| match data.get(key) {
            None => KeyExpiry::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyExpiry::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyExpiry::ExpiresIn(at.saturating_duration_since(Instant::now())),
        })
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        self.check_open()?;
        let keys = self.keys();
        let start = (cursor as usize).min(keys.len());
        let end = start.saturating_add(count.max(1)).min(keys.len());
        let page = keys[start..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.with_entry(key, |data| {
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(StoredValue::Bytes(b"0".to_vec())));
            let StoredValue::Bytes(bytes) = &mut entry.value else {
                return Err(wrong_type());
            };
            let current: i64 = std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    CacheError::Store("value is not an integer or out of range".to_string())
                })?;
            let next = current.checked_add(delta).ok_or_else(|| {
                CacheError::Store("increment or decrement would overflow".to_string())
            })?;
            *bytes = next.to_string().into_bytes();
            Ok(next)
        })?
    }

    async fn lpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64> {
        self.push(key, values, true)
    }

    async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> CacheResult<u64> {
        self.push(key, values, false)
    }

    async fn lpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.pop(key, true)
    }

    async fn rpop(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.pop(key, false)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<Vec<u8>>> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: StoredValue::List(list),
                ..
            }) => Ok(match resolve_range(start, stop, list.len()) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn llen(&self, key: &str) -> CacheResult<u64> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(0),
            Some(Entry {
                value: StoredValue::List(list),
                ..
            }) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64> {
        self.with_entry(key, |data| {
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(StoredValue::Set(BTreeSet::new())));
            let StoredValue::Set(set) = &mut entry.value else {
                return Err(wrong_type());
            };
            Ok(members.into_iter().filter(|m| set.insert(m.clone())).count() as u64)
        })?
    }

    async fn srem(&self, key: &str, members: Vec<Vec<u8>>) -> CacheResult<u64> {
        self.with_entry(key, |data| {
            let Some(entry) = data.get_mut(key) else {
                return Ok(0);
            };
            let StoredValue::Set(set) = &mut entry.value else {
                return Err(wrong_type());
            };
            let removed = members.iter().filter(|m| set.remove(*m)).count() as u64;
            if set.is_empty() {
                data.remove(key);
            }
            Ok(removed)
        })?
    }

    async fn sismember(&self, key: &str, member: &[u8]) -> CacheResult<bool> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(false),
            Some(Entry {
                value: StoredValue::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<Vec<u8>>> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: StoredValue::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn scard(&self, key: &str) -> CacheResult<u64> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(0),
            Some(Entry {
                value: StoredValue::Set(set),
                ..
            }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn hset(&self, key: &str, fields: Vec<(String, String)>) -> CacheResult<()> {
        self.with_entry(key, |data| {
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(StoredValue::Hash(BTreeMap::new())));
            let StoredValue::Hash(hash) = &mut entry.value else {
                return Err(wrong_type());
            };
            hash.extend(fields);
            Ok(())
        })?
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.with_entry(key, |data| match data.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: StoredValue::Hash(hash),
                ..
            }) => Ok(hash.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(_) => Err(wrong_type()),
        })?
    }

    async fn close(&self) -> CacheResult<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.data.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("app:*:__meta", "app:user:1:__meta"));
        assert!(!glob_match("app:*:__meta", "app:user:1"));
        assert!(glob_match("user:?", "user:1"));
        assert!(!glob_match("user:?", "user:12"));
        assert!(glob_match("user:[0-9]", "user:7"));
        assert!(!glob_match("user:[^0-9]", "user:7"));
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
        assert!(glob_match("*a*b*", "xxaxxbxx"));
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0, -1, 3), Some((0, 2)));
        assert_eq!(resolve_range(1, 10, 3), Some((1, 2)));
        assert_eq!(resolve_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(resolve_range(2, 1, 3), None);
        assert_eq!(resolve_range(0, -1, 0), None);
    }

    #[tokio::test]
    async fn test_set_conditions() {
        let store = MemoryStore::new();
        assert!(
            store
                .set("k", b"1".to_vec(), None, SetCondition::IfAbsent)
                .await
                .unwrap()
        );
        assert!(
            !store
                .set("k", b"2".to_vec(), None, SetCondition::IfAbsent)
                .await
                .unwrap()
        );
        assert!(
            !store
                .set("other", b"2".to_vec(), None, SetCondition::IfPresent)
                .await
                .unwrap()
        );
        assert!(
            store
                .set("k", b"3".to_vec(), None, SetCondition::IfPresent)
                .await
                .unwrap()
        );
        assert_eq!(store.get("k").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", b"v".to_vec(), Some(Duration::from_secs(2)), SetCondition::Always)
            .await
            .unwrap();
        assert!(matches!(store.ttl("k").await.unwrap(), KeyExpiry::ExpiresIn(_)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), KeyExpiry::Missing);
    }

    #[tokio::test]
    async fn test_persist() {
        let store = MemoryStore::new();
        store
            .set("k", b"v".to_vec(), Some(Duration::from_secs(60)), SetCondition::Always)
            .await
            .unwrap();
        assert!(store.persist("k").await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), KeyExpiry::Persistent);
        assert!(!store.persist("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_by_keeps_integer_semantics() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by("n", 5).await.unwrap(), 5);
        assert_eq!(store.incr_by("n", -2).await.unwrap(), 3);

        store
            .set("s", b"abc".to_vec(), None, SetCondition::Always)
            .await
            .unwrap();
        assert!(store.incr_by("s", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_lists() {
        let store = MemoryStore::new();
        store
            .lpush("l", vec![b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap();
        store.rpush("l", vec![b"c".to_vec()]).await.unwrap();

        let all = store.lrange("l", 0, -1).await.unwrap();
        assert_eq!(all, vec![b"b".to_vec(), b"a".to_vec(), b"c".to_vec()]);
        assert_eq!(store.rpop("l").await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.lpop("l").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.lpop("l").await.unwrap(), Some(b"a".to_vec()));
        assert!(!store.exists("l").await.unwrap());
    }

    #[tokio::test]
    async fn test_sets_and_wrong_type() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .sadd("s", vec![b"x".to_vec(), b"y".to_vec(), b"x".to_vec()])
                .await
                .unwrap(),
            2
        );
        assert!(store.sismember("s", b"x").await.unwrap());
        assert_eq!(store.scard("s").await.unwrap(), 2);
        assert_eq!(store.srem("s", vec![b"x".to_vec()]).await.unwrap(), 1);

        let err = store.get("s").await.unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_scan_pages_through_all_keys() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store
                .set(&format!("k:{i}"), b"v".to_vec(), None, SetCondition::Always)
                .await
                .unwrap();
        }
        store
            .set("other", b"v".to_vec(), None, SetCondition::Always)
            .await
            .unwrap();

        let mut cursor = 0;
        let mut found = Vec::new();
        loop {
            let (next, page) = store.scan(cursor, "k:*", 10).await.unwrap();
            found.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(found.len(), 25);
    }

    #[tokio::test]
    async fn test_hash_and_close() {
        let store = MemoryStore::new();
        store
            .hset("h", vec![("a".to_string(), "1".to_string())])
            .await
            .unwrap();
        assert_eq!(store.hgetall("h").await.unwrap().get("a"), Some(&"1".to_string()));

        store.close().await.unwrap();
        assert!(store.get("h").await.is_err());
    }
}
