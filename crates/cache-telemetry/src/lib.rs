//! # Cache Telemetry
//!
//! Logging setup for the resilient cache:
//! - `tracing` subscriber initialisation with pretty, compact or JSON output
//! - Span helpers for backend calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, TelemetryError};
