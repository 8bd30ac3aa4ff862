//! Error types for the resilient cache.
//!
//! Backend faults arrive as a raw [`BackendFault`] carrying the backend's numeric
//! error code. The backend adapter translates every fault into a [`BackendError`]
//! whose [`BackendErrorKind`] is a closed set, so classification is a total match.

use crate::backend::codes;
use std::fmt;
use thiserror::Error;

/// Result type for facade and executor operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Raw fault reported by the backend client.
///
/// Opaque to everything but logging: only the adapter looks at `code`.
#[derive(Debug, Error)]
#[error("backend fault {code}: {message}")]
pub struct BackendFault {
    /// Backend-specific error code
    pub code: u32,
    /// Human readable message from the backend
    pub message: String,
    /// Underlying client error, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendFault {
    /// Create a fault with the given code and message
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying client error
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Kind of a translated backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// The key does not exist; a normal miss
    KeyNotFound,
    /// The addressed region has not been created yet
    RegionNotFound,
    /// A region with that name already exists
    RegionAlreadyExists,
    /// The backend did not answer in time
    Timeout,
    /// The connection to the backend was dropped
    ConnectionTerminated,
    /// The backend asks callers to back off
    RetryLater,
    /// Any code without a handling policy
    Unknown,
}

impl BackendErrorKind {
    /// Map a backend error code to its kind
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            codes::KEY_DOES_NOT_EXIST => Self::KeyNotFound,
            codes::REGION_DOES_NOT_EXIST => Self::RegionNotFound,
            codes::REGION_ALREADY_EXISTS => Self::RegionAlreadyExists,
            codes::TIMEOUT => Self::Timeout,
            codes::CONNECTION_TERMINATED => Self::ConnectionTerminated,
            codes::RETRY_LATER => Self::RetryLater,
            _ => Self::Unknown,
        }
    }

    /// Stable name used in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "key_not_found",
            Self::RegionNotFound => "region_not_found",
            Self::RegionAlreadyExists => "region_already_exists",
            Self::Timeout => "timeout",
            Self::ConnectionTerminated => "connection_terminated",
            Self::RetryLater => "retry_later",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend fault normalized by the adapter
#[derive(Debug, Error)]
#[error("{kind}: {raw}")]
pub struct BackendError {
    /// Normalized kind driving classification
    pub kind: BackendErrorKind,
    /// The original fault, kept for diagnostics
    #[source]
    pub raw: BackendFault,
}

impl BackendError {
    /// Translate a raw fault
    #[must_use]
    pub fn from_fault(raw: BackendFault) -> Self {
        Self {
            kind: BackendErrorKind::from_code(raw.code),
            raw,
        }
    }

    /// Build an error of a specific kind (mostly for tests and backends)
    pub fn of_kind(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        let code = match kind {
            BackendErrorKind::KeyNotFound => codes::KEY_DOES_NOT_EXIST,
            BackendErrorKind::RegionNotFound => codes::REGION_DOES_NOT_EXIST,
            BackendErrorKind::RegionAlreadyExists => codes::REGION_ALREADY_EXISTS,
            BackendErrorKind::Timeout => codes::TIMEOUT,
            BackendErrorKind::ConnectionTerminated => codes::CONNECTION_TERMINATED,
            BackendErrorKind::RetryLater => codes::RETRY_LATER,
            BackendErrorKind::Unknown => codes::UNKNOWN,
        };
        Self {
            kind,
            raw: BackendFault::new(code, message),
        }
    }
}

impl From<BackendFault> for BackendError {
    fn from(raw: BackendFault) -> Self {
        Self::from_fault(raw)
    }
}

/// Errors surfaced by the resilient cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// A backend failure the classifier decided to propagate
    #[error("cache backend failure: {0}")]
    Backend(#[from] BackendError),

    /// An operation executor was asked to run a second operation
    #[error("each operation executor can only execute one operation")]
    ExecutorReused,

    /// A value could not be encoded or decoded
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache factory has been shut down
    #[error("cache factory has been disposed")]
    Disposed,

    /// The backend handle or a named cache could not be resolved
    #[error("could not resolve cache '{cache_name}': {message}")]
    Connection {
        /// Name of the cache being resolved
        cache_name: String,
        /// Reason of the last failed attempt
        message: String,
    },

    /// Invalid configuration
    #[error("cache configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Create a connection error
    pub fn connection(cache_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            cache_name: cache_name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error originated in the backend
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Kind of the backend failure, if this is one
    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendErrorKind> {
        match self {
            Self::Backend(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Whether the facade must let this error reach the caller.
    ///
    /// Anything else raised during a backend call is logged and turned into the
    /// operation's absent result.
    #[must_use]
    pub fn must_propagate(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::ExecutorReused | Self::Disposed)
    }
}
