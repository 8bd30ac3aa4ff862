//! # Cache Config
//!
//! Configuration for the resilient cache, loaded from YAML or TOML files and
//! `RESILIENT_CACHE_*` environment variables, validated before use.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    AvailabilitySettings, CacheConfig, CacheConfigBuilder, ConnectionSettings, EndpointConfig,
    RetrySettings,
};
pub use error::{ConfigError, Result};
