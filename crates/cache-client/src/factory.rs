//! Connection handle and named cache lifecycle.
//!
//! The factory owns the single backend handle of the process. It connects on
//! first use (or at construction when `connect_on_startup` is set), memoizes one
//! [`DistributedCache`] per cache name and closes the handle on shutdown.

use crate::cache::DistributedCache;
use cache_config::CacheConfig;
use cache_core::{BackendConnector, BackendFault, BackendHandle, CacheError, CacheResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Owner of the backend connection and of every named cache
pub struct CacheFactory {
    config: CacheConfig,
    connector: Arc<dyn BackendConnector>,
    handle: OnceCell<Arc<dyn BackendHandle>>,
    caches: Mutex<HashMap<String, Arc<DistributedCache>>>,
    disposed: Arc<AtomicBool>,
}

impl fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFactory")
            .field("cache_name", &self.config.cache_name)
            .field("connected", &self.handle.initialized())
            .field("caches", &self.caches.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl CacheFactory {
    /// Validate the configuration and create the factory.
    ///
    /// Connects right away when `connect_on_startup` is set.
    pub async fn new(config: CacheConfig, connector: Arc<dyn BackendConnector>) -> CacheResult<Self> {
        config
            .validate_config()
            .map_err(|e| CacheError::config(e.to_string()))?;

        let factory = Self {
            config,
            connector,
            handle: OnceCell::new(),
            caches: Mutex::new(HashMap::new()),
            disposed: Arc::new(AtomicBool::new(false)),
        };

        if factory.config.connect_on_startup {
            factory.handle().await?;
        }

        info!(
            cache = %factory.config.cache_name,
            endpoints = factory.config.endpoints.len(),
            eager = factory.config.connect_on_startup,
            "Cache factory created"
        );
        Ok(factory)
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cache named in the configuration
    pub async fn default_cache(&self) -> CacheResult<Arc<DistributedCache>> {
        self.cache(&self.config.cache_name).await
    }

    /// The facade over a named cache, opened on first request
    pub async fn cache(&self, name: &str) -> CacheResult<Arc<DistributedCache>> {
        self.ensure_live()?;

        let existing = self.caches.lock().get(name).cloned();
        if let Some(cache) = existing {
            return Ok(cache);
        }

        let handle = self.handle().await?;
        let backend = self
            .resolve(name, "open_cache", || handle.open_cache(name))
            .await?;
        let opened = Arc::new(
            DistributedCache::new(name, backend, &self.config).with_disposal(Arc::clone(&self.disposed)),
        );

        let mut caches = self.caches.lock();
        self.ensure_live()?;
        let cache = Arc::clone(caches.entry(name.to_string()).or_insert(opened));
        info!(cache = name, "Named cache opened");
        Ok(cache)
    }

    /// Whether [`shutdown`](Self::shutdown) ran
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Close the backend handle and forget every cache. Idempotent.
    ///
    /// Caches handed out earlier fail with [`CacheError::Disposed`] afterwards.
    pub fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let caches = std::mem::take(&mut *self.caches.lock());
        if let Some(handle) = self.handle.get() {
            handle.close();
        }
        info!(caches = caches.len(), "Cache factory shut down");
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }

    async fn handle(&self) -> CacheResult<Arc<dyn BackendHandle>> {
        self.ensure_live()?;

        let handle = self
            .handle
            .get_or_try_init(|| self.resolve(&self.config.cache_name, "connect", || self.connector.connect()))
            .await
            .map(Arc::clone)?;

        // shutdown raced with the connection
        if self.is_disposed() {
            handle.close();
            return Err(CacheError::Disposed);
        }
        Ok(handle)
    }

    async fn resolve<T, F, Fut>(&self, cache_name: &str, step: &'static str, mut attempt: F) -> CacheResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendFault>>,
    {
        let attempts = self.config.connection.resolve_attempts.max(1);
        let backoff = self.config.connection.resolve_backoff;

        for n in 1..=attempts {
            match attempt().await {
                Ok(value) => {
                    debug!(cache = cache_name, step, attempt = n, "Resolved");
                    return Ok(value);
                }
                Err(fault) if n == attempts => {
                    error!(cache = cache_name, step, attempt = n, error = %fault, "Giving up");
                    return Err(CacheError::connection(cache_name, fault.to_string()));
                }
                Err(fault) => {
                    warn!(cache = cache_name, step, attempt = n, error = %fault, ?backoff, "Resolution failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(CacheError::connection(cache_name, "no resolution attempt made"))
    }
}

impl Drop for CacheFactory {
    fn drop(&mut self) {
        self.shutdown();
    }
}
