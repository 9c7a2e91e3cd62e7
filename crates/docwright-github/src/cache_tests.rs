//! Tests for the TTL cache.

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_get_returns_none_for_missing_key() {
    let cache: TtlCache<String, String> = TtlCache::new();
    assert!(cache.get(&"missing".to_string()).await.is_none());
}

#[tokio::test]
async fn test_insert_without_ttl_lives_for_process_lifetime() {
    let cache: TtlCache<String, String> = TtlCache::new();
    cache
        .insert("key".to_string(), "value".to_string(), None)
        .await;

    assert_eq!(cache.get(&"key".to_string()).await.as_deref(), Some("value"));
}

#[tokio::test]
async fn test_expired_entry_is_treated_as_absent_and_evicted() {
    let cache: TtlCache<String, String> = TtlCache::new();

    // Negative TTL: expired the moment it is inserted.
    cache
        .insert(
            "key".to_string(),
            "value".to_string(),
            Some(Duration::milliseconds(-1)),
        )
        .await;
    assert_eq!(cache.len().await, 1);

    // Lookup observes the expiry, returns None, and evicts lazily.
    assert!(cache.get(&"key".to_string()).await.is_none());
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn test_unexpired_entry_is_returned_within_ttl() {
    let cache: TtlCache<String, String> = TtlCache::new();
    cache
        .insert(
            "key".to_string(),
            "value".to_string(),
            Some(Duration::minutes(5)),
        )
        .await;

    assert_eq!(cache.get(&"key".to_string()).await.as_deref(), Some("value"));
}

#[tokio::test]
async fn test_invalidate_removes_entry() {
    let cache: TtlCache<String, String> = TtlCache::new();
    cache
        .insert("key".to_string(), "value".to_string(), None)
        .await;

    cache.invalidate(&"key".to_string()).await;
    assert!(cache.get(&"key".to_string()).await.is_none());
}

#[tokio::test]
async fn test_get_or_try_insert_with_runs_factory_once_on_hit() {
    let cache: TtlCache<String, Arc<String>> = TtlCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = calls.clone();
        let value: Result<Arc<String>, std::convert::Infallible> = cache
            .get_or_try_insert_with("key".to_string(), Some(Duration::minutes(5)), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("built".to_string()))
            })
            .await;
        assert_eq!(value.unwrap().as_str(), "built");
    }

    // First call populated the entry; subsequent calls hit the cache.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_or_try_insert_with_rebuilds_after_expiry() {
    let cache: TtlCache<String, Arc<String>> = TtlCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let build = |calls: Arc<AtomicUsize>| async move {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, std::convert::Infallible>(Arc::new(format!("value-{}", n)))
    };

    let first = cache
        .get_or_try_insert_with(
            "key".to_string(),
            Some(Duration::milliseconds(-1)),
            || build(calls.clone()),
        )
        .await
        .unwrap();

    let second = cache
        .get_or_try_insert_with(
            "key".to_string(),
            Some(Duration::minutes(5)),
            || build(calls.clone()),
        )
        .await
        .unwrap();

    // The first entry expired immediately, so the second lookup rebuilt and
    // produced a different object.
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_factory_error_leaves_cache_unchanged() {
    let cache: TtlCache<String, String> = TtlCache::new();

    let result: Result<String, &str> = cache
        .get_or_try_insert_with("key".to_string(), None, || async { Err("factory failed") })
        .await;

    assert_eq!(result, Err("factory failed"));
    assert!(cache.is_empty().await);
}
