//! Integration Tests for the Cache Manager
//!
//! Exercises the public API end to end: read-through caching, capacity and
//! TTL behavior, cascade invalidation, single-flight computation, failure
//! propagation and the background sweeper.

use flightcache::{spawn_sweeper_task, CacheManager, StoreConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// == Read-Through Caching ==

#[tokio::test]
async fn test_read_through_caching() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = calls.clone();
        let profile = manager
            .get_or_compute("profiles", "u1", None, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"id": "u1", "name": "Alice"}))
            })
            .await
            .unwrap();
        assert_eq!(profile["name"], "Alice");
    }

    // The backend was hit once; the other reads were served from cache.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager.get("profiles", "u1").await,
        Some(json!({"id": "u1", "name": "Alice"}))
    );
}

// == Capacity and Recency ==

#[tokio::test]
async fn test_bounded_cache_evicts_least_recently_used() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    manager
        .cache_with("recent", StoreConfig::new().with_capacity(2))
        .await
        .unwrap();

    manager.put("recent", "a", json!(1), None).await;
    manager.put("recent", "b", json!(2), None).await;

    // Touching "a" leaves "b" as the least recently used entry.
    manager.get("recent", "a").await;
    manager.put("recent", "c", json!(3), None).await;

    assert_eq!(manager.get("recent", "a").await, Some(json!(1)));
    assert_eq!(manager.get("recent", "b").await, None);
    assert_eq!(manager.get("recent", "c").await, Some(json!(3)));
    assert_eq!(manager.cache("recent").await.len().await, 2);
}

// == TTL Expiration ==

#[tokio::test]
async fn test_entries_expire_and_recompute() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    manager
        .cache_with(
            "sessions",
            StoreConfig::new().with_default_ttl(Duration::from_millis(100)),
        )
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));

    let first_calls = calls.clone();
    manager
        .get_or_compute("sessions", "s1", None, move || async move {
            first_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"token": "abc"}))
        })
        .await
        .unwrap();

    assert!(manager.get("sessions", "s1").await.is_some());

    sleep(Duration::from_millis(150)).await;

    // The entry expired; the next read-through computes fresh.
    assert_eq!(manager.get("sessions", "s1").await, None);

    let second_calls = calls.clone();
    manager
        .get_or_compute("sessions", "s1", None, move || async move {
            second_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"token": "def"}))
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(manager.get("sessions", "s1").await, Some(json!({"token": "def"})));
}

// == Cascade Invalidation ==

#[tokio::test]
async fn test_write_invalidates_derived_caches() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    manager
        .register_dependency("products", ["allProducts", "productsByCategory"])
        .await
        .unwrap();

    manager
        .put("products", "p1", json!({"name": "widget"}), None)
        .await;
    manager
        .put("allProducts", "list", json!([{"name": "widget"}]), None)
        .await;
    manager
        .put("productsByCategory", "tools", json!([{"name": "widget"}]), None)
        .await;

    // Writing a product clears both derived caches.
    manager
        .put("products", "p2", json!({"name": "gadget"}), None)
        .await;

    assert_eq!(manager.get("allProducts", "list").await, None);
    assert_eq!(manager.get("productsByCategory", "tools").await, None);

    // The written cache keeps its entries.
    assert_eq!(
        manager.get("products", "p1").await,
        Some(json!({"name": "widget"}))
    );
    assert_eq!(
        manager.get("products", "p2").await,
        Some(json!({"name": "gadget"}))
    );
}

#[tokio::test]
async fn test_clear_invalidates_derived_caches() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    manager
        .register_dependency("products", ["allProducts"])
        .await
        .unwrap();

    manager.put("products", "p1", json!(1), None).await;
    manager.put("allProducts", "list", json!([1]), None).await;

    manager.evict_all("products").await;

    assert_eq!(manager.get("products", "p1").await, None);
    assert_eq!(manager.get("allProducts", "list").await, None);
}

#[tokio::test]
async fn test_single_entry_evict_leaves_derived_caches() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    manager
        .register_dependency("products", ["allProducts"])
        .await
        .unwrap();

    manager.put("products", "p1", json!(1), None).await;
    manager.put("allProducts", "list", json!([1]), None).await;

    // Removing one entry does not imply the derived caches went stale.
    assert!(manager.evict("products", "p1").await);

    assert_eq!(manager.get("allProducts", "list").await, Some(json!([1])));
}

#[tokio::test]
async fn test_transitive_cycle_rejected_at_registration() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    manager.register_dependency("a", ["b"]).await.unwrap();
    manager.register_dependency("b", ["c"]).await.unwrap();

    // Closing the chain back to "a" would make every write loop forever.
    let err = manager.register_dependency("c", ["a"]).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("cycle"));

    // The rejected registration left the earlier rules intact.
    manager.put("b", "k", json!(1), None).await;
    manager.put("a", "k", json!(2), None).await;
    assert_eq!(manager.get("b", "k").await, None);
}

// == Single Flight ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_one_computation() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            manager
                .get_or_compute("reports", "daily", None, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    Ok(json!({"rows": 1024}))
                })
                .await
        }));
    }

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report["rows"], 1024);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Failure Handling ==

#[tokio::test]
async fn test_failed_computation_is_not_cached() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    let result = manager
        .get_or_compute("profiles", "u1", None, || async {
            Err(anyhow::anyhow!("profile service timed out").into())
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_compute());
    assert!(err.to_string().contains("profile service timed out"));
    assert_eq!(manager.get("profiles", "u1").await, None);

    // Nothing was cached, so the next call reaches the backend again.
    let profile = manager
        .get_or_compute("profiles", "u1", None, || async {
            Ok(json!({"id": "u1", "name": "Alice"}))
        })
        .await
        .unwrap();
    assert_eq!(profile["name"], "Alice");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_reaches_every_coalesced_caller() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            manager
                .get_or_compute("reports", "weekly", None, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    Err(anyhow::anyhow!("report backend unavailable").into())
                })
                .await
        }));
    }

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("report backend unavailable"));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.get("reports", "weekly").await, None);
}

#[tokio::test]
async fn test_conditional_caching_skips_unwanted_values() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    // A null lookup result is returned but never cached.
    let missing = manager
        .get_or_compute_if(
            "profiles",
            "ghost",
            None,
            || async { Ok(Value::Null) },
            |value| !value.is_null(),
        )
        .await
        .unwrap();

    assert!(missing.is_null());
    assert_eq!(manager.get("profiles", "ghost").await, None);
}

// == Background Sweeper ==

#[tokio::test]
async fn test_background_sweeper_reclaims_expired_entries() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    manager
        .put("sessions", "s1", json!("a"), Some(Duration::from_millis(40)))
        .await;
    manager
        .put("sessions", "s2", json!("b"), Some(Duration::from_millis(40)))
        .await;
    manager.put("sessions", "keep", json!("c"), None).await;

    let sweeper = spawn_sweeper_task(manager.clone(), Duration::from_millis(25));
    sleep(Duration::from_millis(120)).await;
    sweeper.abort();

    // The sweeper reclaimed the expired entries without any reads.
    let store = manager.cache("sessions").await;
    assert_eq!(store.len().await, 1);
    assert_eq!(manager.get("sessions", "keep").await, Some(json!("c")));
}

// == Statistics ==

#[tokio::test]
async fn test_stats_snapshot_serializes() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    manager.put("profiles", "u1", json!({"name": "Alice"}), None).await;
    manager.get("profiles", "u1").await;
    manager.get("profiles", "missing").await;

    let stats = manager.stats().await;
    assert_eq!(stats["profiles"].hit_rate(), 0.5);

    let snapshot = serde_json::to_value(&stats["profiles"]).unwrap();
    assert_eq!(snapshot["hits"], 1);
    assert_eq!(snapshot["misses"], 1);
    assert_eq!(snapshot["total_entries"], 1);
}

// == Lifecycle ==

#[tokio::test]
async fn test_shutdown_then_lazy_recreation() {
    init_tracing();
    let manager: CacheManager<Value> = CacheManager::with_defaults();

    manager.put("profiles", "u1", json!("alice"), None).await;
    manager.put("reports", "daily", json!(42), None).await;

    manager.shutdown().await;
    assert!(manager.store_names().await.is_empty());
    assert_eq!(manager.get("profiles", "u1").await, None);

    // A second shutdown is a no-op.
    manager.shutdown().await;

    // The manager stays usable: a later write lazily recreates the store.
    manager.put("profiles", "u2", json!("bob"), None).await;
    assert_eq!(manager.get("profiles", "u2").await, Some(json!("bob")));
    assert_eq!(manager.store_names().await, vec!["profiles"]);
}
