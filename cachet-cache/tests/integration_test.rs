//! Integration tests for cachet-cache

use cachet_cache::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    sku: String,
    price_cents: u64,
    attributes: serde_json::Value,
}

fn memory_cache() -> Cache {
    Cache::in_memory(CacheConfig::default().with_warmup(false)).unwrap()
}

#[tokio::test]
async fn test_round_trip_values() {
    let cache = memory_cache();
    let product = Product {
        sku: "A-1".to_string(),
        price_cents: 1999,
        attributes: json!({"colors": ["red", "blue"], "dims": {"w": 3, "h": 4}}),
    };

    cache.set("text", "hello world", SetOptions::new()).await.unwrap();
    cache.set("number", &3.5, SetOptions::new()).await.unwrap();
    cache.set("product", &product, SetOptions::new()).await.unwrap();

    let text: Option<String> = cache.get("text", GetOptions::new()).await.unwrap();
    let number: Option<f64> = cache.get("number", GetOptions::new()).await.unwrap();
    let stored: Option<Product> = cache.get("product", GetOptions::new()).await.unwrap();

    assert_eq!(text.as_deref(), Some("hello world"));
    assert_eq!(number, Some(3.5));
    assert_eq!(stored, Some(product));
}

#[tokio::test]
async fn test_missing_key_returns_default() {
    let cache = memory_cache();
    let value: Option<String> = cache.get("never", GetOptions::new()).await.unwrap();
    assert_eq!(value, None);

    let value = cache
        .get("never", GetOptions::new().default_value("fallback".to_string()))
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("fallback"));
}

#[tokio::test(start_paused = true)]
async fn test_expired_key_returns_default() {
    let cache = memory_cache();
    cache
        .set("short", &1, SetOptions::new().ttl(Duration::from_secs(1)))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    let value = cache
        .get("short", GetOptions::new().default_value(0))
        .await
        .unwrap();
    assert_eq!(value, Some(0));
}

#[tokio::test]
async fn test_nx_keeps_first_value() {
    let cache = memory_cache();
    assert!(cache.set("k", &"v", SetOptions::new().nx()).await.unwrap());
    assert!(!cache.set("k", &"v2", SetOptions::new().nx()).await.unwrap());

    let value: Option<String> = cache.get("k", GetOptions::new()).await.unwrap();
    assert_eq!(value.as_deref(), Some("v"));
}

#[tokio::test]
async fn test_clear_by_shared_tag() {
    let cache = memory_cache();
    cache.set("a", &1, SetOptions::new().tags(["t"])).await.unwrap();
    cache
        .set("b", &2, SetOptions::new().tags(["t", "u"]))
        .await
        .unwrap();

    cache.clear(ClearOptions::new().tags(["t"])).await.unwrap();

    let a: Option<i32> = cache.get("a", GetOptions::new()).await.unwrap();
    let b: Option<i32> = cache.get("b", GetOptions::new()).await.unwrap();
    assert_eq!(a, None);
    assert_eq!(b, None);
}

#[tokio::test]
async fn test_tag_clear_spans_scan_pages() {
    let config = CacheConfig::default()
        .with_warmup(false)
        .with_scan_page_size(3);
    let cache = Cache::in_memory(config).unwrap();

    for i in 0..20 {
        let tag = if i % 2 == 0 { "even" } else { "odd" };
        cache
            .set(&format!("item:{i}"), &i, SetOptions::new().tags([tag]))
            .await
            .unwrap();
    }

    let removed = cache
        .clear(ClearOptions::new().tags(["even"]))
        .await
        .unwrap();
    assert_eq!(removed, 20);
    assert!(cache.has("item:1", None).await.unwrap());
    assert!(!cache.has("item:2", None).await.unwrap());
}

#[tokio::test]
async fn test_counter_increment() {
    let cache = ExtendedCache::in_memory(CacheConfig::default().with_warmup(false)).unwrap();
    assert_eq!(cache.increment("c", 5, CounterOptions::new()).await.unwrap(), 5);
    assert_eq!(cache.increment("c", -2, CounterOptions::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_concurrent_get_or_set_may_run_factory_more_than_once() {
    let cache = Arc::new(memory_cache());
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_set("shared", SetOptions::new(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(42u32)
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 42);
    }

    // Cache-aside is not stampede-proof; only a lower bound holds.
    assert!(calls.load(Ordering::SeqCst) >= 1);
    let cached: Option<u32> = cache.get("shared", GetOptions::new()).await.unwrap();
    assert_eq!(cached, Some(42));
}

#[tokio::test]
async fn test_warmup_task_populates_cache() {
    let cache = Arc::new(memory_cache());
    let warm = cache.clone();
    cache.register_warmup_task(
        WarmupTask::new("popular", "Popular products", move || {
            let cache = warm.clone();
            async move {
                cache
                    .set("popular", &vec!["A-1", "B-2"], SetOptions::new().tags(["catalog"]))
                    .await?;
                Ok(())
            }
        })
        .with_priority(5),
    );

    assert!(cache.queue_warmup_task("popular", None).unwrap());
    assert!(!cache.queue_warmup_task("popular", None).unwrap());
    assert_eq!(cache.scheduler().drain().await.as_deref(), Some("popular"));

    let popular: Option<Vec<String>> = cache.get("popular", GetOptions::new()).await.unwrap();
    assert_eq!(popular, Some(vec!["A-1".to_string(), "B-2".to_string()]));
}

#[tokio::test]
async fn test_warmup_timeout_reported_as_event() {
    let cache = memory_cache();
    let mut rx = cache.subscribe();

    cache.register_warmup_task(
        WarmupTask::new("stuck", "Stuck", || std::future::pending())
            .with_timeout(Duration::from_millis(50)),
    );

    let started = std::time::Instant::now();
    let err = cache.run_warmup_task("stuck").await.unwrap_err();
    assert!(matches!(err, CacheError::Warmup(ref e) if e.is_timeout()));
    assert!(started.elapsed() < Duration::from_secs(1));

    let mut failed = None;
    while let Ok(event) = rx.try_recv() {
        if let CacheEvent::Warmup(event) = event
            && let WarmupStatus::Failed { error, .. } = event.status
        {
            failed = Some(error);
        }
    }
    assert!(failed.is_some_and(|e| e.is_timeout()));
}

#[tokio::test]
async fn test_run_unknown_warmup_task() {
    let cache = memory_cache();
    let err = cache.run_warmup_task("ghost").await.unwrap_err();
    assert!(matches!(err, CacheError::Warmup(WarmupError::TaskNotFound(_))));
    assert!(cache.queue_warmup_task("ghost", None).is_err());
}

#[tokio::test]
async fn test_registry_lifecycle() {
    let registry = CacheRegistry::in_memory(CacheConfig::default().with_warmup(false));
    let cache = registry.cache().await.unwrap();
    cache.set("k", &1, SetOptions::new()).await.unwrap();

    registry.destroy().await.unwrap();
    let fresh = registry.cache().await.unwrap();
    assert!(!fresh.has("k", None).await.unwrap());
    assert_eq!(fresh.stats(), CacheStats::default());
}

#[test]
fn test_parse_ttl() {
    assert_eq!(parse_ttl("90").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_ttl("1h 30m").unwrap(), Duration::from_secs(5400));
    assert!(parse_ttl("soon").is_err());
}

// Note: These tests require Redis running on localhost:6379
// They are disabled by default but can be run with: cargo test -- --ignored

#[tokio::test]
#[ignore]
async fn test_redis_round_trip_and_tags() {
    let config = CacheConfig::new("redis://localhost:6379")
        .with_key_prefix("cachet-test")
        .with_warmup(false);
    let cache = Cache::connect(config).await.unwrap();
    cache.clear(ClearOptions::new()).await.unwrap();

    cache
        .set("user:1", &json!({"name": "Alice"}), SetOptions::new().tags(["users"]))
        .await
        .unwrap();
    let user: Option<serde_json::Value> = cache.get("user:1", GetOptions::new()).await.unwrap();
    assert_eq!(user, Some(json!({"name": "Alice"})));

    assert_eq!(
        cache
            .clear(ClearOptions::new().tags(["users"]))
            .await
            .unwrap(),
        2
    );
    cache.destroy().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_nx_and_counters() {
    let config = CacheConfig::new("redis://localhost:6379")
        .with_key_prefix("cachet-test")
        .with_warmup(false);
    let cache = ExtendedCache::connect(config).await.unwrap();
    cache.clear(ClearOptions::new()).await.unwrap();

    assert!(cache.set("nx", &1, SetOptions::new().nx()).await.unwrap());
    assert!(!cache.set("nx", &2, SetOptions::new().nx()).await.unwrap());
    assert_eq!(cache.increment("c", 5, CounterOptions::new()).await.unwrap(), 5);
    assert_eq!(cache.decrement("c", 2, CounterOptions::new()).await.unwrap(), 3);
    cache.destroy().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_sub_second_ttl() {
    let config = CacheConfig::new("redis://localhost:6379")
        .with_key_prefix("cachet-test")
        .with_warmup(false);
    let cache = Cache::connect(config).await.unwrap();
    cache.clear(ClearOptions::new()).await.unwrap();

    cache
        .set("short", &1, SetOptions::new().ttl(Duration::from_millis(300)))
        .await
        .unwrap();
    match cache.ttl("short", None).await.unwrap() {
        KeyExpiry::ExpiresIn(left) => assert!(left <= Duration::from_millis(300)),
        other => panic!("unexpected expiry {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!cache.has("short", None).await.unwrap());

    cache.set("gone", &1, SetOptions::new()).await.unwrap();
    cache.expire("gone", Duration::ZERO, None).await.unwrap();
    assert!(!cache.has("gone", None).await.unwrap());
    cache.destroy().await.unwrap();
}
