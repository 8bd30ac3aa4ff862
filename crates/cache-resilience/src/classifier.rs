//! Backend failure classification.
//!
//! Decides, per backend error, whether the executor retries, swallows the
//! failure as an absent result, or propagates it. Every classifier carries a
//! retry budget that bounds the number of decisions it makes before giving up.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use cache_config::RetrySettings;
use cache_core::{BackendError, BackendErrorKind};
use std::time::Duration;
use tracing::{debug, error, warn};

/// What the executor does with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    must_retry: bool,
    rethrow: bool,
}

impl RetryDecision {
    /// Run the operation again
    #[must_use]
    pub const fn retry() -> Self {
        Self {
            must_retry: true,
            rethrow: false,
        }
    }

    /// Stop and return the empty result
    #[must_use]
    pub const fn swallow() -> Self {
        Self {
            must_retry: false,
            rethrow: false,
        }
    }

    /// Stop and return the error
    #[must_use]
    pub const fn propagate() -> Self {
        Self {
            must_retry: false,
            rethrow: true,
        }
    }

    /// Whether the operation must be attempted again
    #[must_use]
    pub const fn must_retry(&self) -> bool {
        self.must_retry
    }

    /// Whether the error must reach the caller
    #[must_use]
    pub const fn rethrow(&self) -> bool {
        self.rethrow
    }
}

/// Failure classification used by the executor
#[async_trait]
pub trait Classify: Send {
    /// Decide how to continue after `error`
    async fn handle(&mut self, error: &BackendError) -> RetryDecision;
}

/// Classifier settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Decisions allowed before every error propagates
    pub budget: u32,
    /// Pause before retrying a timed out call
    pub timeout_backoff: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for ClassifierConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            budget: settings.budget,
            timeout_backoff: settings.timeout_backoff,
        }
    }
}

/// Decision table over [`BackendErrorKind`], with region self-heal.
///
/// The budget is spent on every call, before the kind is looked at. A missing
/// key is always a plain miss; once the budget is spent every other kind
/// propagates.
#[derive(Debug)]
pub struct ExceptionClassifier {
    context: ExecutionContext,
    remaining: u32,
    timeout_backoff: Duration,
}

impl ExceptionClassifier {
    /// Create a classifier for one logical call
    #[must_use]
    pub fn new(context: ExecutionContext, config: ClassifierConfig) -> Self {
        Self {
            context,
            remaining: config.budget,
            timeout_backoff: config.timeout_backoff,
        }
    }

    /// Decisions left before everything propagates
    #[must_use]
    pub fn remaining_budget(&self) -> u32 {
        self.remaining
    }

    async fn create_region(&mut self) -> RetryDecision {
        let Some(region) = self.context.region().cloned() else {
            error!("Default region reported missing, nothing to create");
            return RetryDecision::propagate();
        };

        debug!(region = %region, "Creating missing region");
        match self.context.adapter().create_region(region.as_str()).await {
            Ok(created) => {
                debug!(region = %region, created, "Region self-heal done");
            }
            Err(e) => {
                warn!(region = %region, kind = %e.kind, "Region creation failed");
                let nested = self.handle(&e).await;
                debug!(region = %region, ?nested, "Handled region creation failure");
            }
        }
        RetryDecision::retry()
    }
}

#[async_trait]
impl Classify for ExceptionClassifier {
    async fn handle(&mut self, error: &BackendError) -> RetryDecision {
        let exhausted = self.remaining == 0;
        self.remaining = self.remaining.saturating_sub(1);

        if error.kind == BackendErrorKind::KeyNotFound {
            return RetryDecision::swallow();
        }
        if exhausted {
            debug!(kind = %error.kind, "Retry budget exhausted");
            return RetryDecision::propagate();
        }

        match error.kind {
            BackendErrorKind::KeyNotFound => RetryDecision::swallow(),
            BackendErrorKind::RegionNotFound => self.create_region().await,
            BackendErrorKind::RegionAlreadyExists => RetryDecision::propagate(),
            BackendErrorKind::Timeout => {
                tokio::time::sleep(self.timeout_backoff).await;
                RetryDecision::retry()
            }
            BackendErrorKind::ConnectionTerminated => RetryDecision::retry(),
            BackendErrorKind::RetryLater => {
                self.context.tracker().notify_unavailability();
                RetryDecision::propagate()
            }
            BackendErrorKind::Unknown => {
                error!(
                    error = %error,
                    code = error.raw.code,
                    "Unmapped backend error, a new handling policy is required"
                );
                RetryDecision::propagate()
            }
        }
    }
}
