//! Factory integration tests
//!
//! Connection handling, cache memoization and shutdown.

use crate::fixtures::*;
use crate::helpers::*;
use cache_core::CacheError;
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Test every caller shares the same cache instance
#[tokio::test]
async fn test_named_caches_are_shared() {
    let harness = TestHarness::new().await;

    let (first, _) = harness.default_cache().await;
    let (second, _) = harness.default_cache().await;
    let sessions = harness.factory.cache("sessions").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sessions.cache_name(), "sessions");
    assert_eq!(harness.connector.connects(), 1);
}

/// Test concurrent first requests open one cache
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests() {
    let harness = Arc::new(TestHarness::new().await);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move { harness.factory.cache("catalog").await.unwrap() })
        })
        .collect();

    let mut caches = Vec::new();
    for task in tasks {
        caches.push(task.await.unwrap());
    }

    assert!(caches.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(harness.connector.connects(), 1);
}

/// Test caches share data through the backend, not through the facade
#[tokio::test]
async fn test_data_survives_facade_lookup() {
    let harness = TestHarness::new().await;
    let (cache, _) = harness.default_cache().await;
    cache.add("k", None, Some("v"), None).await.unwrap();

    let again = harness.factory.default_cache().await.unwrap();
    let found: Option<String> = again.get("k", None).await.unwrap();
    assert_eq!(found.as_deref(), Some("v"));
}

/// Test shutdown closes the connection and rejects further use
#[tokio::test]
async fn test_shutdown_rejects_further_use() {
    let harness = TestHarness::new().await;
    harness.default_cache().await;

    harness.factory.shutdown();
    assert_eq!(harness.connector.closes(), 1);

    let err = harness.factory.cache("catalog").await.unwrap_err();
    assert!(matches!(err, CacheError::Disposed));
    assert!(err.must_propagate());
}

/// Test a cache obtained before shutdown stops working once the factory is disposed
#[tokio::test]
async fn test_shutdown_disposes_held_caches() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    let region = cache.region(&Catalog::Products);
    cache
        .add("sku-1", Some(&region), Some(&product("sku-1", 1)), None)
        .await
        .unwrap();
    let calls = backend.calls();

    harness.factory.shutdown();
    assert!(cache.is_disposed());

    let disposed = |result: Result<(), CacheError>| matches!(result, Err(CacheError::Disposed));
    assert!(disposed(
        cache
            .add("sku-2", Some(&region), Some(&product("sku-2", 2)), None)
            .await
    ));
    assert!(disposed(cache.add::<Product>("sku-1", Some(&region), None, None).await));
    assert!(disposed(cache.get::<Product>("sku-1", Some(&region)).await.map(drop)));
    assert!(disposed(cache.try_get::<Product>("sku-1", Some(&region)).await.map(drop)));
    assert!(disposed(cache.remove("sku-1", Some(&region)).await.map(drop)));
    assert!(disposed(cache.remove_region(&region).await.map(drop)));
    assert!(disposed(cache.clear_region(&region).await.map(drop)));
    let keys = vec!["sku-1".to_string()];
    assert!(disposed(cache.bulk_get::<Product>(&keys, &region).await.map(drop)));
    assert!(disposed(cache.try_bulk_get::<Product>(&keys, &region).await.map(drop)));
    assert!(disposed(cache.objects_in_region::<Product>(&region).await.map(drop)));

    assert_eq!(backend.calls(), calls);
    assert_eq!(harness.connector.closes(), 1);
}

/// Test an unreachable backend fails resolution after the configured attempts
#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_fails_resolution() {
    let harness = TestHarness::new().await;
    harness.connector.fail_connects(2);

    let err = harness.factory.default_cache().await.unwrap_err();
    assert!(matches!(err, CacheError::Connection { .. }));

    // the failed resolution is not memoized
    assert!(harness.factory.default_cache().await.is_ok());
    assert_eq!(harness.connector.connects(), 1);
}
