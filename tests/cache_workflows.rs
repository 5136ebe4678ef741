//! Integration tests for common cachet workflows.
//!
//! These exercise the facade re-exports across both member crates.

use cachet::prelude::*;
use cachet::{CacheEvent, WarmupStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: u64,
    title: String,
}

fn article(id: u64) -> Article {
    Article {
        id,
        title: format!("Article {id}"),
    }
}

// =============================================================================
// Cache-aside with tag invalidation
// =============================================================================

#[tokio::test]
async fn test_cache_aside_then_invalidate_by_tag() {
    let registry = CacheRegistry::in_memory(CacheConfig::default().with_warmup(false));
    let cache = registry.cache().await.unwrap();

    let first: Article = cache
        .get_or_set(
            "article:1",
            SetOptions::new().namespace("blog").tags(["articles", "author:7"]),
            || async { Ok(article(1)) },
        )
        .await
        .unwrap();
    assert_eq!(first, article(1));

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let again: Article = cache
        .get_or_set("article:1", SetOptions::new().namespace("blog"), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(article(99))
        })
        .await
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let removed = cache
        .clear(ClearOptions::new().namespace("blog").tags(["author:7"]))
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let gone: Option<Article> = cache
        .get("article:1", GetOptions::new().namespace("blog"))
        .await
        .unwrap();
    assert_eq!(gone, None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.sets, 1);
    registry.destroy().await.unwrap();
}

// =============================================================================
// Periodic warmup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_warmup_runs_by_priority() {
    let config = CacheConfig::default().with_warmup_interval(Duration::from_millis(50));
    let cache = Arc::new(Cache::in_memory(config).unwrap());

    let completed = Arc::new(Mutex::new(Vec::new()));
    let sink = completed.clone();
    cache.on(move |event| {
        if let CacheEvent::Warmup(event) = event
            && matches!(event.status, WarmupStatus::Completed { .. })
        {
            sink.lock().unwrap().push(event.task_id.clone());
        }
    });

    for (id, priority) in [("low", 1), ("high", 10), ("mid", 5)] {
        let warm = cache.clone();
        cache.register_warmup_task(
            WarmupTask::new(id, id, move || {
                let cache = warm.clone();
                async move {
                    cache
                        .set(&format!("warm:{id}"), &priority, SetOptions::new())
                        .await?;
                    Ok(())
                }
            })
            .with_priority(priority),
        );
        cache.queue_warmup_task(id, None).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(175)).await;

    assert_eq!(*completed.lock().unwrap(), vec!["high", "mid", "low"]);
    assert!(cache.has("warm:low", None).await.unwrap());
    cache.destroy().await.unwrap();
}

// =============================================================================
// Derived structures
// =============================================================================

#[tokio::test]
async fn test_extended_cache_structures() {
    let registry = CacheRegistry::in_memory(CacheConfig::default().with_warmup(false));
    let cache = registry.extended().await.unwrap();

    let views = cache
        .increment("views:1", 1, CounterOptions::new().namespace("blog"))
        .await
        .unwrap();
    assert_eq!(views, 1);

    cache
        .rpush("recent", &[article(1), article(2)], Some("blog"))
        .await
        .unwrap();
    let recent: Vec<Article> = cache.lrange("recent", 0, -1, Some("blog")).await.unwrap();
    assert_eq!(recent, vec![article(1), article(2)]);

    cache.sadd("tags", &["rust", "cache"], None).await.unwrap();
    assert!(cache.sismember("tags", "rust", None).await.unwrap());
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_stream_order() {
    let cache = Cache::in_memory(CacheConfig::default().with_warmup(false)).unwrap();
    let mut rx = cache.subscribe();

    cache.set("k", &1, SetOptions::new()).await.unwrap();
    let _: Option<i32> = cache.get("k", GetOptions::new()).await.unwrap();
    cache.del("k", DelOptions::new()).await.unwrap();
    cache.clear(ClearOptions::new()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec!["set", "hit", "delete", "clear"]);
}

// =============================================================================
// Logging
// =============================================================================

#[test]
fn test_logging_config_from_lookup() {
    let config = LogConfig::from_lookup(|name| match name {
        "CACHET_LOG_FORMAT" => Some("json".to_string()),
        _ => None,
    });
    assert_eq!(config.format, cachet::logging::Format::Json);
    assert_eq!(config.level, cachet::logging::Level::Info);
}
