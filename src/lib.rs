//! # Resilient Cache
//!
//! Resilient access layer for a remote, region-partitioned cache backend.
//!
//! ## Features
//!
//! - Typed regions named after discriminator values
//! - Availability tracking with throttled keep-alive probes
//! - Bounded retries with on-demand region creation
//! - One shared connection per process, one facade per named cache
//!
//! ## Usage
//!
//! ```rust,no_run
//! use resilient_cache::{CacheConfig, CacheFactory, Discriminator, MemoryConnector};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! enum Catalog {
//!     Products,
//! }
//!
//! impl Discriminator for Catalog {}
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::builder().cache_name("catalog").build()?;
//! let factory = CacheFactory::new(config, Arc::new(MemoryConnector::new())).await?;
//!
//! let cache = factory.default_cache().await?;
//! let region = cache.region(&Catalog::Products);
//! cache
//!     .add("sku-1", Some(&region), Some(&1999_u64), Some(Duration::from_secs(60)))
//!     .await?;
//! let price: Option<u64> = cache.get("sku-1", Some(&region)).await?;
//! assert_eq!(price, Some(1999));
//!
//! factory.shutdown();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use cache_client::{CacheFactory, DistributedCache};
pub use cache_config::{CacheConfig, CacheConfigBuilder, ConfigError};
pub use cache_core::{
    codes, BackendConnector, BackendError, BackendErrorKind, BackendFault, BackendHandle,
    CacheBackend, CacheError, CacheResult, Discriminator, MemoryBackend, MemoryConnector, Region,
    RegionKeyResolver,
};
pub use cache_resilience::{AvailabilityStats, AvailabilityTracker, RetryDecision};
pub use cache_telemetry::{init_logging, LogFormat, LoggingConfig};
