//! # Cache Resilience
//!
//! Resilient access to an intermittently unavailable cache backend:
//! - Backend adapter normalizing raw faults
//! - Availability tracking with throttled keep-alive probes
//! - Failure classification with a bounded retry budget and region self-heal
//! - Single-use retrying executor

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod availability;
pub mod classifier;
pub mod context;
pub mod executor;

// Re-export main types
pub use adapter::BackendAdapter;
pub use availability::{
    AvailabilityConfig, AvailabilityStats, AvailabilityTracker, BackendKeepAlive, KeepAlive,
};
pub use classifier::{ClassifierConfig, Classify, ExceptionClassifier, RetryDecision};
pub use context::ExecutionContext;
pub use executor::OperationExecutor;
