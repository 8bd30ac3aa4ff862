//! Availability integration tests
//!
//! Short-circuiting while the backend asks to retry later, keep-alive
//! recovery and the bounded wait of the first request.

use crate::fixtures::*;
use crate::helpers::*;
use cache_core::{codes, BackendErrorKind};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn config_with_cooldown(cooldown: Duration) -> cache_config::CacheConfig {
    let mut config = test_config();
    config.availability.probe_cooldown = cooldown;
    config
}

/// Test an unavailable backend is not called until a probe succeeds
#[tokio::test(start_paused = true)]
async fn test_unavailable_backend_short_circuits_then_recovers() {
    let cooldown = Duration::from_secs(5);
    let harness = TestHarness::with_config(config_with_cooldown(cooldown)).await;
    let (cache, backend) = harness.default_cache().await;
    let region = cache.region(&Catalog::Products);
    backend.set_offline(true);

    let err = cache
        .add("sku-1", Some(&region), Some(&product("sku-1", 1)), None)
        .await
        .unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::RetryLater));
    assert!(!cache.tracker().stats().is_available);

    // the first probe since construction is waited for, and fails while offline
    let started = tokio::time::Instant::now();
    let found: Option<Product> = cache.get("sku-1", Some(&region)).await.unwrap();
    assert_eq!(found, None);
    assert!(started.elapsed() > Duration::ZERO);
    assert_eq!(cache.tracker().stats().probes_launched, 1);
    assert!(cache.tracker().stats().has_processed_first_request);

    let calls = backend.calls();
    backend.set_offline(false);

    cache
        .add("sku-1", Some(&region), Some(&product("sku-1", 1)), None)
        .await
        .unwrap();
    assert!(!cache.remove("sku-1", Some(&region)).await.unwrap());
    assert!(!cache.remove_region(&region).await.unwrap());
    assert!(!cache.clear_region(&region).await.unwrap());
    let found: Option<Product> = cache.get("sku-1", Some(&region)).await.unwrap();
    assert_eq!(found, None);
    let all: Vec<Product> = cache.objects_in_region(&region).await.unwrap();
    assert!(all.is_empty());
    assert_eq!(backend.calls(), calls);
    assert_eq!(cache.tracker().stats().probes_launched, 1);

    // after the cooldown the next probe runs in the background and succeeds
    tokio::time::sleep(cooldown + Duration::from_millis(100)).await;
    assert!(!cache.tracker().check_is_available().await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cache.tracker().stats().is_available);
    assert_eq!(cache.tracker().stats().probes_launched, 2);

    cache
        .add("sku-1", Some(&region), Some(&product("sku-1", 1)), None)
        .await
        .unwrap();
    let found: Option<Product> = cache.get("sku-1", Some(&region)).await.unwrap();
    assert_eq!(found, Some(product("sku-1", 1)));
}

/// Test the first request waits for a probe that finishes in time
#[tokio::test(start_paused = true)]
async fn test_first_request_waits_for_recovery() {
    let (cache, backend, probe) = cache_with_slow_probe(&test_config(), Duration::from_millis(600));
    cache.tracker().notify_unavailability();

    let started = tokio::time::Instant::now();
    cache.add("k", None, Some("v"), None).await.unwrap();
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(600), "waited {waited:?}");
    assert!(waited < Duration::from_millis(2500), "waited {waited:?}");
    assert_eq!(probe.probes(), 1);
    assert_eq!(backend.item_count(None), 1);

    let found: Option<String> = cache.get("k", None).await.unwrap();
    assert_eq!(found.as_deref(), Some("v"));
}

/// Test healthy traffic does not use up the wait on the first outage
#[tokio::test(start_paused = true)]
async fn test_first_outage_after_healthy_traffic_waits_for_recovery() {
    let (cache, backend, probe) = cache_with_slow_probe(&test_config(), Duration::from_millis(600));
    cache.add("k", None, Some("v"), None).await.unwrap();
    let found: Option<String> = cache.get("k", None).await.unwrap();
    assert_eq!(found.as_deref(), Some("v"));
    assert!(!cache.tracker().stats().has_processed_first_request);

    backend.inject_fault(codes::RETRY_LATER, 1);
    let err = cache.get::<String>("k", None).await.unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::RetryLater));

    let started = tokio::time::Instant::now();
    let found: Option<String> = cache.get("k", None).await.unwrap();
    let waited = started.elapsed();

    assert_eq!(found.as_deref(), Some("v"));
    assert!(waited >= Duration::from_millis(600), "waited {waited:?}");
    assert!(waited < Duration::from_millis(2500), "waited {waited:?}");
    assert_eq!(probe.probes(), 1);
}

/// Test the first request gives up waiting on a slow probe
#[tokio::test(start_paused = true)]
async fn test_first_request_wait_is_bounded() {
    let (cache, backend, probe) = cache_with_slow_probe(&test_config(), Duration::from_secs(10));
    cache.tracker().notify_unavailability();

    let started = tokio::time::Instant::now();
    let found: Option<String> = cache.get("k", None).await.unwrap();
    let waited = started.elapsed();

    assert_eq!(found, None);
    assert!(waited >= Duration::from_millis(2500), "waited {waited:?}");
    assert!(waited < Duration::from_secs(10), "waited {waited:?}");
    assert_eq!(backend.calls(), 0);

    // no second probe inside the cooldown
    let found: Option<String> = cache.get("k", None).await.unwrap();
    assert_eq!(found, None);
    assert_eq!(probe.probes(), 1);
}

/// Test repeated transient failures exhaust the budget and surface
#[tokio::test]
async fn test_exhausted_budget_surfaces_error() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    backend.inject_fault(codes::CONNECTION_TERMINATED, 10);

    let err = cache.get::<String>("k", None).await.unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::ConnectionTerminated));
    // one attempt plus one retry per unit of budget
    assert_eq!(backend.calls(), 3);
    assert!(cache.tracker().stats().is_available);
}

/// Test a timeout followed by success is invisible to the caller
#[tokio::test(start_paused = true)]
async fn test_transient_timeout_is_retried() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    cache.add("k", None, Some(&42_u64), None).await.unwrap();
    backend.inject_fault(codes::TIMEOUT, 1);

    let found: Option<u64> = cache.get("k", None).await.unwrap();
    assert_eq!(found, Some(42));
}

/// Test an unmapped backend code reaches the caller
#[tokio::test]
async fn test_unknown_fault_propagates() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    backend.inject_fault(999, 1);

    let err = cache.remove("k", None).await.unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::Unknown));
    assert_eq!(backend.calls(), 1);
}
