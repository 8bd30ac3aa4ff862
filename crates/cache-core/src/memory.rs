//! In-memory backend.
//!
//! Follows the region lifecycle rules of the remote service: the default region
//! always exists, named regions must be created before items are stored in
//! them. Faults can be injected to drive the resilience layer in tests and
//! local development.

use crate::backend::{codes, BackendConnector, BackendHandle, CacheBackend, RawEntries};
use crate::error::BackendFault;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug)]
struct StoredEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

type Partition = HashMap<String, StoredEntry>;

#[derive(Debug, Default)]
struct Store {
    default_region: Partition,
    regions: HashMap<String, Partition>,
}

impl Store {
    fn partition(&mut self, region: Option<&str>) -> Result<&mut Partition, BackendFault> {
        let partition = match region {
            None => &mut self.default_region,
            Some(name) => self.regions.get_mut(name).ok_or_else(|| {
                BackendFault::new(
                    codes::REGION_DOES_NOT_EXIST,
                    format!("region '{name}' does not exist"),
                )
            })?,
        };
        partition.retain(|_, entry| !entry.is_expired());
        Ok(partition)
    }
}

/// Region-partitioned, TTL-aware in-memory cache
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Mutex<Store>,
    faults: Mutex<VecDeque<u32>>,
    offline: AtomicBool,
    calls: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls fail with `code`
    pub fn inject_fault(&self, code: u32, times: usize) {
        let mut faults = self.faults.lock();
        faults.extend(std::iter::repeat(code).take(times));
    }

    /// Drop any pending injected faults
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// While offline every call fails with `RETRY_LATER`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of backend calls received so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether a named region exists
    pub fn has_region(&self, name: &str) -> bool {
        self.store.lock().regions.contains_key(name)
    }

    /// Number of live items in a region (`None` for the default region)
    pub fn item_count(&self, region: Option<&str>) -> usize {
        self.store
            .lock()
            .partition(region)
            .map_or(0, |partition| partition.len())
    }

    fn enter(&self, operation: &'static str) -> Result<(), BackendFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace!(operation, "Memory backend call");

        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendFault::new(
                codes::RETRY_LATER,
                "backend is offline, retry later",
            ));
        }
        if let Some(code) = self.faults.lock().pop_front() {
            debug!(operation, code, "Injected fault");
            return Err(BackendFault::new(code, format!("injected fault on {operation}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        region: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendFault> {
        self.enter("put")?;
        let mut store = self.store.lock();
        store
            .partition(region)?
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<Vec<u8>>, BackendFault> {
        self.enter("get")?;
        let mut store = self.store.lock();
        Ok(store.partition(region)?.get(key).map(|e| e.data.clone()))
    }

    async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool, BackendFault> {
        self.enter("remove")?;
        let mut store = self.store.lock();
        Ok(store.partition(region)?.remove(key).is_some())
    }

    async fn create_region(&self, region: &str) -> Result<bool, BackendFault> {
        self.enter("create_region")?;
        let mut store = self.store.lock();
        if store.regions.contains_key(region) {
            return Ok(false);
        }
        store.regions.insert(region.to_string(), Partition::new());
        Ok(true)
    }

    async fn remove_region(&self, region: &str) -> Result<bool, BackendFault> {
        self.enter("remove_region")?;
        Ok(self.store.lock().regions.remove(region).is_some())
    }

    async fn clear_region(&self, region: &str) -> Result<bool, BackendFault> {
        self.enter("clear_region")?;
        let mut store = self.store.lock();
        store.partition(Some(region))?.clear();
        Ok(true)
    }

    async fn bulk_get(&self, keys: &[String], region: &str) -> Result<RawEntries, BackendFault> {
        self.enter("bulk_get")?;
        let mut store = self.store.lock();
        let partition = store.partition(Some(region))?;
        Ok(keys
            .iter()
            .filter_map(|key| partition.get(key).map(|e| (key.clone(), e.data.clone())))
            .collect())
    }

    async fn objects_in_region(&self, region: &str) -> Result<RawEntries, BackendFault> {
        self.enter("objects_in_region")?;
        let mut store = self.store.lock();
        let mut entries: RawEntries = store
            .partition(Some(region))?
            .iter()
            .map(|(key, e)| (key.clone(), e.data.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    caches: Mutex<HashMap<String, Arc<MemoryBackend>>>,
    pending_connect_failures: AtomicU32,
    connects: AtomicU32,
    closes: AtomicU32,
}

impl ConnectorState {
    fn backend(&self, name: &str) -> Arc<MemoryBackend> {
        Arc::clone(
            self.caches
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryBackend::new())),
        )
    }
}

/// Connector producing handles over a shared set of in-memory caches
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<ConnectorState>,
}

impl MemoryConnector {
    /// Create a connector with no caches
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend serving a named cache, created on first use
    pub fn backend(&self, cache_name: &str) -> Arc<MemoryBackend> {
        self.state.backend(cache_name)
    }

    /// Make the next `times` connection attempts fail
    pub fn fail_connects(&self, times: u32) {
        self.state
            .pending_connect_failures
            .store(times, Ordering::SeqCst);
    }

    /// Successful connections made so far
    pub fn connects(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Handles closed so far
    pub fn closes(&self) -> u32 {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn BackendHandle>, BackendFault> {
        let failed = self
            .state
            .pending_connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BackendFault::new(
                codes::CONNECTION_TERMINATED,
                "could not reach cache host",
            ));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryHandle {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection handle returned by [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryHandle {
    state: Arc<ConnectorState>,
    closed: AtomicBool,
}

#[async_trait]
impl BackendHandle for MemoryHandle {
    async fn open_cache(&self, name: &str) -> Result<Arc<dyn CacheBackend>, BackendFault> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendFault::new(
                codes::CONNECTION_TERMINATED,
                "connection handle is closed",
            ));
        }
        let backend: Arc<dyn CacheBackend> = self.state.backend(name);
        Ok(backend)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
