//! Boundary to the remote cache service.
//!
//! These traits are the only contract the resilient layer needs from a backend
//! client library. Every failure is reported as a [`BackendFault`] carrying one
//! of the [`codes`].

use crate::error::BackendFault;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Error codes reported by backend clients
pub mod codes {
    /// Code without a known meaning
    pub const UNKNOWN: u32 = 0;
    /// The key does not exist
    pub const KEY_DOES_NOT_EXIST: u32 = 1;
    /// The region does not exist
    pub const REGION_DOES_NOT_EXIST: u32 = 2;
    /// The region already exists
    pub const REGION_ALREADY_EXISTS: u32 = 3;
    /// The request timed out
    pub const TIMEOUT: u32 = 4;
    /// The connection was terminated
    pub const CONNECTION_TERMINATED: u32 = 5;
    /// The service is temporarily unable to serve requests
    pub const RETRY_LATER: u32 = 6;
    /// The named cache does not exist on the service
    pub const CACHE_DOES_NOT_EXIST: u32 = 7;
}

/// Raw entries as returned by bulk reads
pub type RawEntries = Vec<(String, Vec<u8>)>;

/// One named cache on the remote service.
///
/// `region = None` addresses the service's default region, which always exists.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store a value, replacing any previous one
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        region: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendFault>;

    /// Read a value; `Ok(None)` is a miss
    async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<Vec<u8>>, BackendFault>;

    /// Remove a key; returns whether it existed
    async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool, BackendFault>;

    /// Create a region; returns `false` if it already existed
    async fn create_region(&self, region: &str) -> Result<bool, BackendFault>;

    /// Remove a region and all its items
    async fn remove_region(&self, region: &str) -> Result<bool, BackendFault>;

    /// Remove every item of a region, keeping the region
    async fn clear_region(&self, region: &str) -> Result<bool, BackendFault>;

    /// Read several keys of a region at once; missing keys are omitted
    async fn bulk_get(&self, keys: &[String], region: &str) -> Result<RawEntries, BackendFault>;

    /// Read every item of a region
    async fn objects_in_region(&self, region: &str) -> Result<RawEntries, BackendFault>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Process-wide connection to the cache service
#[async_trait]
pub trait BackendHandle: Send + Sync {
    /// Open a named cache
    async fn open_cache(&self, name: &str) -> Result<Arc<dyn CacheBackend>, BackendFault>;

    /// Release the connection. Must be idempotent.
    fn close(&self);
}

/// Establishes the connection handle
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Connect to the service
    async fn connect(&self) -> Result<Arc<dyn BackendHandle>, BackendFault>;
}
