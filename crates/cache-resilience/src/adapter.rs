//! Backend adapter.
//!
//! Wraps every raw backend call in a span and translates its [`BackendFault`]
//! into a [`BackendError`].

use cache_core::{BackendError, BackendFault, CacheBackend, RawEntries};
use cache_telemetry::backend_call_span;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Normalizing wrapper around one named cache
#[derive(Clone)]
pub struct BackendAdapter {
    backend: Arc<dyn CacheBackend>,
    cache_name: Arc<str>,
}

impl fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("backend", &self.backend.name())
            .field("cache_name", &self.cache_name)
            .finish()
    }
}

impl BackendAdapter {
    /// Wrap a named cache
    pub fn new(cache_name: impl Into<Arc<str>>, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            cache_name: cache_name.into(),
        }
    }

    /// Name of the wrapped cache
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Name of the backend implementation
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn call<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T, BackendError>
    where
        Fut: Future<Output = Result<T, BackendFault>>,
    {
        call.instrument(backend_call_span!(self.cache_name, operation))
            .await
            .map_err(BackendError::from_fault)
    }

    /// Store a value
    pub async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        region: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.call("put", self.backend.put(key, value, region, ttl))
            .await
    }

    /// Read a value
    pub async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<Vec<u8>>, BackendError> {
        self.call("get", self.backend.get(key, region)).await
    }

    /// Remove a key
    pub async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool, BackendError> {
        self.call("remove", self.backend.remove(key, region)).await
    }

    /// Create a region
    pub async fn create_region(&self, region: &str) -> Result<bool, BackendError> {
        self.call("create_region", self.backend.create_region(region))
            .await
    }

    /// Remove a region
    pub async fn remove_region(&self, region: &str) -> Result<bool, BackendError> {
        self.call("remove_region", self.backend.remove_region(region))
            .await
    }

    /// Clear a region
    pub async fn clear_region(&self, region: &str) -> Result<bool, BackendError> {
        self.call("clear_region", self.backend.clear_region(region))
            .await
    }

    /// Read several keys of a region
    pub async fn bulk_get(&self, keys: &[String], region: &str) -> Result<RawEntries, BackendError> {
        self.call("bulk_get", self.backend.bulk_get(keys, region))
            .await
    }

    /// Read every item of a region
    pub async fn objects_in_region(&self, region: &str) -> Result<RawEntries, BackendError> {
        self.call("objects_in_region", self.backend.objects_in_region(region))
            .await
    }
}
