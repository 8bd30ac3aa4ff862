//! Per-call execution context.

use crate::adapter::BackendAdapter;
use crate::availability::AvailabilityTracker;
use cache_core::Region;

/// Everything one logical cache call needs to execute and classify failures
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    tracker: AvailabilityTracker,
    adapter: BackendAdapter,
    region: Option<Region>,
}

impl ExecutionContext {
    /// Create a context; `region = None` addresses the default region
    #[must_use]
    pub fn new(tracker: AvailabilityTracker, adapter: BackendAdapter, region: Option<Region>) -> Self {
        Self {
            tracker,
            adapter,
            region,
        }
    }

    /// Availability tracker of the backend
    #[must_use]
    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    /// Adapter of the named cache
    #[must_use]
    pub fn adapter(&self) -> &BackendAdapter {
        &self.adapter
    }

    /// Region addressed by the call
    #[must_use]
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Region name as passed to the backend
    #[must_use]
    pub fn region_name(&self) -> Option<&str> {
        self.region.as_ref().map(Region::as_str)
    }
}
