//! # Cache Core
//!
//! Shared types for the resilient cache:
//! - Backend boundary traits and error codes
//! - Normalized backend errors and the crate-wide error type
//! - Regions and their resolution from discriminators
//! - An in-memory backend with fault injection

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod region;

// Re-export main types
pub use backend::{codes, BackendConnector, BackendHandle, CacheBackend, RawEntries};
pub use error::{BackendError, BackendErrorKind, BackendFault, CacheError, CacheResult};
pub use memory::{MemoryBackend, MemoryConnector, MemoryHandle};
pub use region::{sanitize_region_name, Discriminator, Region, RegionKeyResolver};
