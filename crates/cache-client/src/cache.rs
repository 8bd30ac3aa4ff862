//! Public cache facade.
//!
//! Every operation first asks the availability tracker whether the backend may
//! be called. While it may not, operations return their empty result without
//! touching the backend. Otherwise the call runs through a fresh single-use
//! executor.

use cache_config::CacheConfig;
use cache_core::{
    BackendError, CacheBackend, CacheError, CacheResult, Discriminator, Region, RegionKeyResolver,
};
use cache_resilience::{
    AvailabilityConfig, AvailabilityTracker, BackendAdapter, ClassifierConfig, ExecutionContext,
    OperationExecutor,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Resilient facade over one named cache
pub struct DistributedCache {
    adapter: BackendAdapter,
    tracker: AvailabilityTracker,
    resolver: RegionKeyResolver,
    classifier: ClassifierConfig,
    disposed: Arc<AtomicBool>,
}

impl fmt::Debug for DistributedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedCache")
            .field("adapter", &self.adapter)
            .field("tracker", &self.tracker)
            .field("regions", &self.resolver.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl DistributedCache {
    /// Build a facade over a named cache with the configured policies
    pub fn new(cache_name: &str, backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        let adapter = BackendAdapter::new(cache_name, backend);
        let tracker =
            AvailabilityTracker::new(adapter.clone(), AvailabilityConfig::from(&config.availability));
        let resolver = RegionKeyResolver::new(&config.instance_prefix, &config.schema_version);
        Self::from_parts(adapter, tracker, resolver, ClassifierConfig::from(&config.retry))
    }

    /// Assemble a facade from its collaborators
    #[must_use]
    pub fn from_parts(
        adapter: BackendAdapter,
        tracker: AvailabilityTracker,
        resolver: RegionKeyResolver,
        classifier: ClassifierConfig,
    ) -> Self {
        Self {
            adapter,
            tracker,
            resolver,
            classifier,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share the disposal flag of the owner, so the facade stops working once
    /// the owner shuts down
    pub(crate) fn with_disposal(mut self, disposed: Arc<AtomicBool>) -> Self {
        self.disposed = disposed;
        self
    }

    /// Whether the owning factory has shut down
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Name of the underlying cache
    #[must_use]
    pub fn cache_name(&self) -> &str {
        self.adapter.cache_name()
    }

    /// Availability tracker of the backend
    #[must_use]
    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    /// Region registry of this cache
    #[must_use]
    pub fn resolver(&self) -> &RegionKeyResolver {
        &self.resolver
    }

    /// Resolve the region of a discriminator
    pub fn region<D: Discriminator + ?Sized>(&self, discriminator: &D) -> Region {
        self.resolver.resolve(discriminator)
    }

    /// Store a value.
    ///
    /// `value = None` removes the key. `expiration = None` keeps the item until
    /// it is removed or evicted.
    pub async fn add<T>(
        &self,
        key: &str,
        region: Option<&Region>,
        value: Option<&T>,
        expiration: Option<Duration>,
    ) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
    {
        debug!(cache = self.cache_name(), key, region = ?region, ?expiration, "Add");
        self.ensure_live()?;

        let Some(value) = value else {
            return self.remove(key, region).await.map(|_| ());
        };

        if !self.is_available("add").await {
            return Ok(());
        }

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(cache = self.cache_name(), key, error = %e, "Could not serialize value");
                return Ok(());
            }
        };

        let adapter = &self.adapter;
        let region_name = region.map(Region::as_str);
        self.run("add", region, move || {
            adapter.put(key, bytes.clone(), region_name, expiration)
        })
        .await
    }

    /// Read a value; `None` if absent or the backend is unavailable
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        region: Option<&Region>,
    ) -> CacheResult<Option<T>> {
        debug!(cache = self.cache_name(), key, region = ?region, "Get");
        self.lookup(key, region).await
    }

    /// Read a value, reporting whether it was found
    pub async fn try_get<T: DeserializeOwned + Default>(
        &self,
        key: &str,
        region: Option<&Region>,
    ) -> CacheResult<(bool, T)> {
        debug!(cache = self.cache_name(), key, region = ?region, "TryGet");
        Ok(match self.lookup(key, region).await? {
            Some(value) => (true, value),
            None => (false, T::default()),
        })
    }

    /// Read several keys of a region; `None` if the backend is unavailable.
    ///
    /// Entries that cannot be decoded as `T` are skipped.
    pub async fn try_bulk_get<T: DeserializeOwned>(
        &self,
        keys: &[String],
        region: &Region,
    ) -> CacheResult<Option<Vec<(String, T)>>> {
        debug!(cache = self.cache_name(), region = %region, keys = keys.len(), "TryBulkGet");
        self.ensure_live()?;
        if !self.is_available("bulk_get").await {
            return Ok(None);
        }

        let adapter = &self.adapter;
        let entries = self
            .run("bulk_get", Some(region), move || {
                adapter.bulk_get(keys, region.as_str())
            })
            .await?;

        Ok(Some(
            entries
                .into_iter()
                .filter_map(|(key, bytes)| self.decode::<T>(&key, &bytes).map(|value| (key, value)))
                .collect(),
        ))
    }

    /// Read several keys of a region; empty if the backend is unavailable
    pub async fn bulk_get<T: DeserializeOwned>(
        &self,
        keys: &[String],
        region: &Region,
    ) -> CacheResult<Vec<(String, T)>> {
        Ok(self.try_bulk_get(keys, region).await?.unwrap_or_default())
    }

    /// Remove a key; `false` if it was absent or the backend is unavailable
    pub async fn remove(&self, key: &str, region: Option<&Region>) -> CacheResult<bool> {
        debug!(cache = self.cache_name(), key, region = ?region, "Remove");
        self.ensure_live()?;
        if !self.is_available("remove").await {
            return Ok(false);
        }

        let adapter = &self.adapter;
        let region_name = region.map(Region::as_str);
        self.run("remove", region, move || adapter.remove(key, region_name))
            .await
    }

    /// Remove a region with all its items
    pub async fn remove_region(&self, region: &Region) -> CacheResult<bool> {
        debug!(cache = self.cache_name(), region = %region, "RemoveRegion");
        self.ensure_live()?;
        if !self.is_available("remove_region").await {
            return Ok(false);
        }

        let adapter = &self.adapter;
        self.run("remove_region", Some(region), move || {
            adapter.remove_region(region.as_str())
        })
        .await
    }

    /// Remove every item of a region
    pub async fn clear_region(&self, region: &Region) -> CacheResult<bool> {
        debug!(cache = self.cache_name(), region = %region, "ClearRegion");
        self.ensure_live()?;
        if !self.is_available("clear_region").await {
            return Ok(false);
        }

        let adapter = &self.adapter;
        self.run("clear_region", Some(region), move || {
            adapter.clear_region(region.as_str())
        })
        .await
    }

    /// Every value of a region that decodes as `T`
    pub async fn objects_in_region<T: DeserializeOwned>(&self, region: &Region) -> CacheResult<Vec<T>> {
        debug!(cache = self.cache_name(), region = %region, "GetObjectsInRegion");
        self.ensure_live()?;
        if !self.is_available("objects_in_region").await {
            return Ok(Vec::new());
        }

        let adapter = &self.adapter;
        let entries = self
            .run("objects_in_region", Some(region), move || {
                adapter.objects_in_region(region.as_str())
            })
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|(key, bytes)| self.decode(&key, &bytes))
            .collect())
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        region: Option<&Region>,
    ) -> CacheResult<Option<T>> {
        self.ensure_live()?;
        if !self.is_available("get").await {
            return Ok(None);
        }

        let adapter = &self.adapter;
        let region_name = region.map(Region::as_str);
        let bytes = self
            .run("get", region, move || adapter.get(key, region_name))
            .await?;

        Ok(bytes.and_then(|bytes| self.decode(key, &bytes)))
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }

    async fn is_available(&self, operation: &'static str) -> bool {
        if self.tracker.check_is_available().await {
            return true;
        }
        warn!(cache = self.cache_name(), operation, "Backend is not available");
        false
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, region: Option<&Region>, call: F) -> CacheResult<T>
    where
        T: Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let context = ExecutionContext::new(self.tracker.clone(), self.adapter.clone(), region.cloned());
        let executor = OperationExecutor::new(context, self.classifier);

        match executor.execute(call).await {
            Ok(value) => Ok(value),
            Err(e) if e.must_propagate() => Err(e),
            Err(e) => {
                error!(cache = self.cache_name(), operation, error = %e, "Unexpected failure during backend call");
                Ok(T::default())
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Option<T> {
        match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                let e = CacheError::from(e);
                debug!(cache = self.cache_name(), key, error = %e, "Skipping value of another type");
                None
            }
        }
    }
}
