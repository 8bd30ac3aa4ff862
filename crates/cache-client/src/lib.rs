//! # Cache Client
//!
//! Public surface of the resilient cache: the [`DistributedCache`] facade over
//! one named cache and the [`CacheFactory`] owning the backend connection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod factory;

// Re-export main types
pub use cache::DistributedCache;
pub use factory::CacheFactory;
