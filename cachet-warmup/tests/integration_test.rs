//! Integration tests for cachet-warmup

use cachet_warmup::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_queue_twice_then_run_unknown() {
    let scheduler = WarmupScheduler::new();
    scheduler.register(WarmupTask::new("users", "Users", || async { Ok(()) }));

    assert!(scheduler.queue("users", None).unwrap());
    assert!(!scheduler.queue("users", None).unwrap());

    let err = scheduler.run("does-not-exist").await.unwrap_err();
    assert!(matches!(err, WarmupError::TaskNotFound(ref id) if id == "does-not-exist"));
}

#[tokio::test]
async fn test_never_resolving_task_times_out() {
    let scheduler = WarmupScheduler::new();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    scheduler.on_event(move |event| {
        if let WarmupStatus::Failed { error, .. } = &event.status {
            sink.lock().unwrap().push(error.clone());
        }
    });

    scheduler.register(
        WarmupTask::new("hang", "Hang", || std::future::pending())
            .with_timeout(Duration::from_millis(50)),
    );
    scheduler.queue("hang", None).unwrap();

    let started = std::time::Instant::now();
    assert_eq!(scheduler.drain().await.as_deref(), Some("hang"));
    assert!(started.elapsed() < Duration::from_secs(1));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_drain_respects_priority() {
    let scheduler = WarmupScheduler::with_config(
        WarmupConfig::default().with_interval(Duration::from_millis(50)),
    );
    let order = Arc::new(Mutex::new(Vec::new()));

    for (id, priority) in [("low", 0), ("mid", 5), ("high", 10)] {
        let order = order.clone();
        scheduler.register(
            WarmupTask::new(id, id, move || {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(id);
                    Ok(())
                }
            })
            .with_priority(priority),
        );
        scheduler.queue(id, None).unwrap();
    }

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(175)).await;
    scheduler.stop().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn test_requeue_after_completion() {
    let scheduler = WarmupScheduler::new();
    let runs = Arc::new(AtomicU32::new(0));
    let runs_clone = runs.clone();
    scheduler.register(WarmupTask::new("again", "Again", move || {
        let runs = runs_clone.clone();
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    for _ in 0..3 {
        assert!(scheduler.queue("again", None).unwrap());
        scheduler.drain().await;
    }

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    let stats = scheduler.task_stats("again").unwrap();
    assert_eq!(stats.run_count, 3);
    assert_eq!(stats.status, TaskStatus::Completed);
    assert!(stats.last_run.is_some());
}

#[test]
fn test_warmup_error_display() {
    let err = WarmupError::TaskNotFound("gone".to_string());
    assert!(err.to_string().contains("gone"));
}
