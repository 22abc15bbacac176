//! Drain/shutdown controller with in-flight caller tracking.
//!
//! Uses `ArcSwap` for lock-free lifecycle state transitions, a `watch`
//! channel to stop the worker pool, and an atomic counter with RAII guards
//! for callers still waiting on a result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use batchgate_core::PriorityLanes;
use tokio::sync::watch;

/// Interval at which `wait_for_drain` re-checks the lanes.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle state of the batching service.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Workers not yet launched.
    Starting,
    /// Workers running, new requests admitted.
    Ready,
    /// Shutdown requested: admission closed, lanes draining.
    Draining,
    /// Lanes empty and every worker joined.
    Stopped,
}

impl HealthState {
    /// Lowercase name used in the health endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates admission, worker shutdown, and drain.
///
/// 1. Admission takes an in-flight guard, then checks `is_accepting()`
/// 2. `begin_drain()` moves to Draining so new requests are rejected
/// 3. `wait_for_drain()` blocks until both lanes are empty and no admitted
///    caller is still waiting
/// 4. `signal_stop()` tells the worker loops to exit after their current cycle
/// 5. `mark_stopped()` once every worker has been joined
#[derive(Debug)]
pub struct ShutdownController {
    stop_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: Arc<ArcSwap<HealthState>>,
}

impl ShutdownController {
    /// Creates a new controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            stop_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
        }
    }

    /// Transitions `Starting -> Ready`: the worker pool is running.
    ///
    /// Returns `false` and leaves the state alone if the service has
    /// already moved past `Starting`, so a drain is never undone.
    pub fn set_ready(&self) -> bool {
        let previous = self.health_state.rcu(|state| match **state {
            HealthState::Starting => HealthState::Ready,
            other => other,
        });
        *previous == HealthState::Starting
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Whether admission may enqueue new requests.
    ///
    /// Requests arriving before startup completes are accepted; they wait in
    /// the lanes until the workers come up.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        matches!(
            self.health_state(),
            HealthState::Starting | HealthState::Ready
        )
    }

    /// Closes admission by moving to `Draining`.
    ///
    /// The store and the in-flight counter are both `SeqCst`: a caller that
    /// raised the counter before this store is seen by `wait_for_drain`, and
    /// a caller that raised it after sees `Draining` and backs out.
    pub fn begin_drain(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
    }

    /// Returns a receiver that flips to `true` when workers must stop.
    #[must_use]
    pub fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.stop_signal.subscribe()
    }

    /// Tells every worker loop to exit after its current cycle.
    pub fn signal_stop(&self) {
        // Ignore send errors -- workers may already be gone
        let _ = self.stop_signal.send(true);
    }

    /// Transitions to `Stopped` after the pool has been joined.
    pub fn mark_stopped(&self) {
        self.health_state.store(Arc::new(HealthState::Stopped));
    }

    /// Creates an RAII guard counting a caller waiting for its result.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Number of admitted callers that have not yet received a result.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Blocks until both lanes are empty and every admitted caller has
    /// received its result.
    ///
    /// Waiting on the counter as well as the lanes covers a caller that
    /// passed the admission check but has not enqueued yet. There is no
    /// timeout: a stuck downstream call holds shutdown for as long as it
    /// holds the batch.
    pub async fn wait_for_drain(&self, lanes: &PriorityLanes) {
        let mut ticker = tokio::time::interval(DRAIN_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            if lanes.is_empty() && self.in_flight_count() == 0 {
                return;
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
///
/// Dropped even when the waiting caller's future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
