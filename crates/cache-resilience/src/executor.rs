//! Single-use retrying executor.
//!
//! Runs one backend operation until it succeeds, the classifier swallows the
//! failure, or the classifier decides it must propagate. Only backend errors
//! are classified; anything else is returned as is.

use crate::classifier::{ClassifierConfig, Classify, ExceptionClassifier};
use crate::context::ExecutionContext;
use cache_core::{CacheError, CacheResult};
use parking_lot::Mutex;
use std::future::Future;
use tracing::{debug, error};

/// Executes exactly one operation against the backend
#[derive(Debug)]
pub struct OperationExecutor<C = ExceptionClassifier> {
    context: ExecutionContext,
    /// Taken by the first execution; `None` afterwards
    classifier: Mutex<Option<C>>,
}

impl OperationExecutor<ExceptionClassifier> {
    /// Create an executor using the standard classifier
    #[must_use]
    pub fn new(context: ExecutionContext, config: ClassifierConfig) -> Self {
        let classifier = ExceptionClassifier::new(context.clone(), config);
        Self::with_classifier(context, classifier)
    }
}

impl<C: Classify> OperationExecutor<C> {
    /// Create an executor using a custom classifier
    #[must_use]
    pub fn with_classifier(context: ExecutionContext, classifier: C) -> Self {
        Self {
            context,
            classifier: Mutex::new(Some(classifier)),
        }
    }

    /// Context of the call
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Run `operation`, retrying as the classifier decides.
    ///
    /// A swallowed failure yields `T::default()`. Calling this a second time
    /// fails with [`CacheError::ExecutorReused`].
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> CacheResult<T>
    where
        T: Default,
        E: Into<CacheError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut classifier = self
            .classifier
            .lock()
            .take()
            .ok_or(CacheError::ExecutorReused)?;

        let cache = self.context.adapter().cache_name();
        let region = self.context.region_name().unwrap_or_default();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(cache, region, attempt, "Executing backend operation");

            let error = match operation().await.map_err(Into::into) {
                Ok(value) => return Ok(value),
                Err(CacheError::Backend(error)) => error,
                Err(other) => {
                    error!(cache, region, error = %other, "Rethrowing unhandleable error");
                    return Err(other);
                }
            };

            let decision = classifier.handle(&error).await;
            if decision.must_retry() {
                debug!(cache, region, attempt, kind = %error.kind, "Expected backend error, retrying");
                continue;
            }
            if !decision.rethrow() {
                debug!(cache, region, attempt, kind = %error.kind, "Backend error swallowed");
                return Ok(T::default());
            }

            error!(cache, region, attempt, kind = %error.kind, error = %error, "Rethrowing backend error");
            return Err(CacheError::Backend(error));
        }
    }
}
