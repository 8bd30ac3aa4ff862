//! Backend availability tracking.
//!
//! The tracker starts out available. A backend signalling "retry later" marks it
//! unavailable; from then on callers short-circuit while a keep-alive probe is
//! launched at most once per cooldown window. A successful probe makes the
//! backend available again.

use crate::adapter::BackendAdapter;
use async_trait::async_trait;
use cache_config::AvailabilitySettings;
use cache_core::BackendError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const NEVER_CHECKED: u64 = u64::MAX;
const MIN_FIRST_PROBE_POLL: Duration = Duration::from_millis(1);

/// Minimal round-trip proving the backend answers
#[async_trait]
pub trait KeepAlive: Send + Sync {
    /// Perform the probe
    async fn keep_alive(&self) -> Result<(), BackendError>;
}

/// Keep-alive writing then removing a throwaway key in the default region
#[derive(Debug, Clone)]
pub struct BackendKeepAlive {
    adapter: BackendAdapter,
}

impl BackendKeepAlive {
    /// Create a probe over the given adapter
    #[must_use]
    pub fn new(adapter: BackendAdapter) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl KeepAlive for BackendKeepAlive {
    async fn keep_alive(&self) -> Result<(), BackendError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let key = format!("keep-alive-{stamp}");
        self.adapter.put(&key, vec![1], None, None).await?;
        self.adapter.remove(&key, None).await?;
        Ok(())
    }
}

/// Availability tracker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityConfig {
    /// Minimum interval between two probes
    pub probe_cooldown: Duration,
    /// Longest wait for the outcome of the first probe after construction
    pub first_probe_wait: Duration,
    /// Poll step of that wait
    pub first_probe_poll_interval: Duration,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self::from(&AvailabilitySettings::default())
    }
}

impl From<&AvailabilitySettings> for AvailabilityConfig {
    fn from(settings: &AvailabilitySettings) -> Self {
        Self {
            probe_cooldown: settings.probe_cooldown,
            first_probe_wait: settings.first_probe_wait,
            first_probe_poll_interval: settings.first_probe_poll_interval,
        }
    }
}

/// Point-in-time view of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityStats {
    /// Whether the backend is considered reachable
    pub is_available: bool,
    /// Keep-alive probes launched so far
    pub probes_launched: u64,
    /// When the last probe was launched
    pub last_checked_at: Option<Instant>,
    /// Whether the first probe after construction has been launched
    pub has_processed_first_request: bool,
}

struct TrackerInner {
    config: AvailabilityConfig,
    keep_alive: Arc<dyn KeepAlive>,
    is_available: AtomicBool,
    has_processed_first_request: AtomicBool,
    /// Nanoseconds since `origin`; written only while holding `probe_lock`
    last_checked: AtomicU64,
    origin: Instant,
    probes_launched: AtomicU64,
    probe_lock: tokio::sync::Mutex<()>,
}

/// Tracks whether the backend is reachable.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AvailabilityTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for AvailabilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityTracker")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl AvailabilityTracker {
    /// Create a tracker probing through the backend adapter
    #[must_use]
    pub fn new(adapter: BackendAdapter, config: AvailabilityConfig) -> Self {
        Self::with_probe(Arc::new(BackendKeepAlive::new(adapter)), config)
    }

    /// Create a tracker with a custom keep-alive probe
    #[must_use]
    pub fn with_probe(keep_alive: Arc<dyn KeepAlive>, config: AvailabilityConfig) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config,
                keep_alive,
                is_available: AtomicBool::new(true),
                has_processed_first_request: AtomicBool::new(false),
                last_checked: AtomicU64::new(NEVER_CHECKED),
                origin: Instant::now(),
                probes_launched: AtomicU64::new(0),
                probe_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Mark the backend unavailable. Idempotent.
    pub fn notify_unavailability(&self) {
        if self.inner.is_available.swap(false, Ordering::AcqRel) {
            warn!("Backend marked as unavailable");
        }
    }

    /// Whether the backend may be called.
    ///
    /// While unavailable, launches a keep-alive probe if the cooldown has
    /// elapsed. The caller launching the first probe since construction waits
    /// a bounded time for its outcome; later probes run in the background.
    pub async fn check_is_available(&self) -> bool {
        let inner = &self.inner;
        if inner.is_available.load(Ordering::Acquire) {
            return true;
        }

        if !self.cooldown_elapsed() {
            return false;
        }

        let _guard = inner.probe_lock.lock().await;
        if self.cooldown_elapsed() {
            if let Some(probe) = self.launch_probe() {
                if !inner.has_processed_first_request.swap(true, Ordering::AcqRel) {
                    self.wait_for_first_probe(&probe).await;
                }
            }
            self.mark_checked();
        }

        inner.is_available.load(Ordering::Acquire)
    }

    /// Current state
    #[must_use]
    pub fn stats(&self) -> AvailabilityStats {
        let inner = &self.inner;
        let last_checked = inner.last_checked.load(Ordering::Acquire);
        AvailabilityStats {
            is_available: inner.is_available.load(Ordering::Acquire),
            probes_launched: inner.probes_launched.load(Ordering::Acquire),
            last_checked_at: (last_checked != NEVER_CHECKED)
                .then(|| inner.origin + Duration::from_nanos(last_checked)),
            has_processed_first_request: inner.has_processed_first_request.load(Ordering::Acquire),
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        let last_checked = self.inner.last_checked.load(Ordering::Acquire);
        if last_checked == NEVER_CHECKED {
            return true;
        }
        let since_origin = self.inner.origin.elapsed();
        since_origin.saturating_sub(Duration::from_nanos(last_checked)) > self.inner.config.probe_cooldown
    }

    fn mark_checked(&self) {
        let nanos = u64::try_from(self.inner.origin.elapsed().as_nanos()).unwrap_or(NEVER_CHECKED - 1);
        self.inner.last_checked.store(nanos, Ordering::Release);
    }

    fn launch_probe(&self) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Could not schedule keep-alive probe");
                return None;
            }
        };

        let launched = self.inner.probes_launched.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(probe = launched, "Launching keep-alive probe");

        let tracker = self.clone();
        Some(runtime.spawn(async move { tracker.perform_keep_alive().await }))
    }

    async fn perform_keep_alive(&self) {
        let outcome = AssertUnwindSafe(self.inner.keep_alive.keep_alive())
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                if !self.inner.is_available.swap(true, Ordering::AcqRel) {
                    info!("Backend is available again");
                }
            }
            Ok(Err(e)) => {
                self.notify_unavailability();
                warn!(error = %e, kind = %e.kind, "Keep-alive probe failed, backend is not available");
            }
            Err(_) => {
                self.notify_unavailability();
                error!("Keep-alive probe panicked");
            }
        }
    }

    async fn wait_for_first_probe(&self, probe: &JoinHandle<()>) {
        let config = &self.inner.config;
        let poll = config.first_probe_poll_interval.max(MIN_FIRST_PROBE_POLL);
        let max_polls = config.first_probe_wait.as_nanos().div_ceil(poll.as_nanos());
        let mut polls: u128 = 0;
        let mut waited = Duration::ZERO;
        while polls < max_polls
            && !probe.is_finished()
            && !self.inner.is_available.load(Ordering::Acquire)
        {
            tokio::time::sleep(poll).await;
            polls += 1;
            waited += poll;
        }
        debug!(
            waited_ms = waited.as_millis() as u64,
            available = self.inner.is_available.load(Ordering::Acquire),
            "First keep-alive wait finished"
        );
    }
}
