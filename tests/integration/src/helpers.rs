//! Test helper utilities for integration tests

use async_trait::async_trait;
use cache_client::{CacheFactory, DistributedCache};
use cache_config::CacheConfig;
use cache_core::{BackendError, MemoryBackend, MemoryConnector, RegionKeyResolver};
use cache_resilience::{
    AvailabilityConfig, AvailabilityTracker, BackendAdapter, BackendKeepAlive, ClassifierConfig,
    KeepAlive,
};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Configuration used across the integration tests
pub fn test_config() -> CacheConfig {
    CacheConfig::builder()
        .cache_name("catalog")
        .instance_prefix("shop_eu")
        .schema_version("1.4")
        .endpoint("cache-1.internal", 22233)
        .timeout_backoff(Duration::from_millis(10))
        .resolve_policy(2, Duration::from_millis(10))
        .build()
        .unwrap_or_else(|e| panic!("invalid test config: {e}"))
}

/// Factory over an in-memory connector
pub struct TestHarness {
    /// Factory under test
    pub factory: CacheFactory,
    /// Connector shared with the factory
    pub connector: MemoryConnector,
}

impl TestHarness {
    /// Harness with [`test_config`]
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Harness with a custom configuration
    pub async fn with_config(config: CacheConfig) -> Self {
        init_tracing();
        let connector = MemoryConnector::new();
        let factory = CacheFactory::new(config, Arc::new(connector.clone()))
            .await
            .unwrap_or_else(|e| panic!("factory creation failed: {e}"));
        Self { factory, connector }
    }

    /// The configured cache together with its backend
    pub async fn default_cache(&self) -> (Arc<DistributedCache>, Arc<MemoryBackend>) {
        let cache = self
            .factory
            .default_cache()
            .await
            .unwrap_or_else(|e| panic!("default cache unavailable: {e}"));
        let backend = self.connector.backend(cache.cache_name());
        (cache, backend)
    }
}

/// Keep-alive that takes `delay` before probing the real backend
pub struct SlowKeepAlive {
    inner: BackendKeepAlive,
    delay: Duration,
    probes: AtomicU32,
}

impl SlowKeepAlive {
    /// Wrap the standard probe of `adapter`
    pub fn new(adapter: BackendAdapter, delay: Duration) -> Self {
        Self {
            inner: BackendKeepAlive::new(adapter),
            delay,
            probes: AtomicU32::new(0),
        }
    }

    /// Probes started so far
    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepAlive for SlowKeepAlive {
    async fn keep_alive(&self) -> Result<(), BackendError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.keep_alive().await;
        tracing::debug!(ok = result.is_ok(), "Slow keep-alive finished");
        result
    }
}

/// Facade whose keep-alive probe takes `probe_delay`
pub fn cache_with_slow_probe(
    config: &CacheConfig,
    probe_delay: Duration,
) -> (DistributedCache, Arc<MemoryBackend>, Arc<SlowKeepAlive>) {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    let adapter = BackendAdapter::new(config.cache_name.as_str(), backend.clone());
    let probe = Arc::new(SlowKeepAlive::new(adapter.clone(), probe_delay));
    let tracker = AvailabilityTracker::with_probe(
        probe.clone(),
        AvailabilityConfig::from(&config.availability),
    );
    let resolver = RegionKeyResolver::new(&config.instance_prefix, &config.schema_version);
    let cache = DistributedCache::from_parts(
        adapter,
        tracker,
        resolver,
        ClassifierConfig::from(&config.retry),
    );
    (cache, backend, probe)
}
