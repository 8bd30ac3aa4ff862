//! Region integration tests
//!
//! Region naming, memoization and on-demand creation of missing regions.

use crate::fixtures::*;
use crate::helpers::*;
use cache_core::codes;
use pretty_assertions::assert_eq;

/// Test region names combine prefix, version, type and value
#[tokio::test]
async fn test_region_names_are_sanitized() {
    let harness = TestHarness::new().await;
    let (cache, _) = harness.default_cache().await;

    assert_eq!(cache.region(&Catalog::Products).as_str(), "shopeu-14-Catalog-Products");
    assert_eq!(cache.region(&Sessions::Active).as_str(), "shopeu-14-Sessions-Active");
}

/// Test each discriminator resolves once
#[tokio::test]
async fn test_regions_are_memoized() {
    let harness = TestHarness::new().await;
    let (cache, _) = harness.default_cache().await;

    let first = cache.region(&Catalog::Products);
    let second = cache.region(&Catalog::Products);
    cache.region(&Catalog::Prices);

    assert_eq!(first, second);
    assert_eq!(cache.resolver().len(), 2);
}

/// Test a write into a region that does not exist yet creates it
#[tokio::test]
async fn test_missing_region_is_created_on_write() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    let region = cache.region(&Catalog::Products);
    assert!(!backend.has_region(region.as_str()));

    cache
        .add("sku-1", Some(&region), Some(&product("sku-1", 10)), None)
        .await
        .unwrap();

    assert!(backend.has_region(region.as_str()));
    // put, create_region, put
    assert_eq!(backend.calls(), 3);
}

/// Test a region dropped behind the cache's back is recreated
#[tokio::test]
async fn test_region_removed_externally_heals() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    let region = cache.region(&Sessions::Active);

    cache.add("s1", Some(&region), Some("alice"), None).await.unwrap();
    assert!(cache.remove_region(&region).await.unwrap());
    assert!(!backend.has_region(region.as_str()));

    let found: Option<String> = cache.get("s1", Some(&region)).await.unwrap();
    assert_eq!(found, None);
    assert!(backend.has_region(region.as_str()));

    cache.add("s1", Some(&region), Some("bob"), None).await.unwrap();
    let found: Option<String> = cache.get("s1", Some(&region)).await.unwrap();
    assert_eq!(found.as_deref(), Some("bob"));
}

/// Test a failing region creation still ends within the retry budget
#[tokio::test]
async fn test_failing_region_creation_is_bounded() {
    let harness = TestHarness::new().await;
    let (cache, backend) = harness.default_cache().await;
    let region = cache.region(&Catalog::Prices);

    // put fails, create_region times out, put fails again, budget is spent
    backend.inject_fault(codes::REGION_DOES_NOT_EXIST, 1);
    backend.inject_fault(codes::TIMEOUT, 1);

    let err = cache
        .add("p", Some(&region), Some(&1_u32), None)
        .await
        .unwrap_err();
    assert!(err.is_backend());
    assert!(!backend.has_region(region.as_str()));
}
