//! The assembled batching service and its startup/shutdown lifecycle.

use std::sync::Arc;

use batchgate_core::{Classifier, PriorityLanes, PriorityPolicy};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::admission::Admission;
use super::completion::CompletionRegistry;
use super::config::{BatcherConfig, ConfigError};
use super::dispatch::BatchDispatcher;
use super::scheduler::BatchScheduler;
use super::shutdown::ShutdownController;
use crate::error::ClassifyError;

/// Owns the lanes, the completion registry, and the worker pool.
///
/// Lifecycle:
/// 1. `new()` -- allocates shared state; requests may already be admitted
/// 2. `on_startup()` -- launches the worker pool and marks the service Ready
/// 3. `on_shutdown()` -- closes admission, waits for the lanes to drain,
///    then stops and joins the workers
pub struct BatchingService {
    config: BatcherConfig,
    lanes: Arc<PriorityLanes>,
    registry: Arc<CompletionRegistry>,
    shutdown: Arc<ShutdownController>,
    dispatcher: Arc<BatchDispatcher>,
    admission: Admission,
    scheduler: Mutex<Option<BatchScheduler>>,
}

impl BatchingService {
    /// Builds the service around `classifier` without starting any worker.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(config: BatcherConfig, classifier: Arc<dyn Classifier>) -> Result<Self, ConfigError> {
        config.validate()?;

        let lanes = Arc::new(PriorityLanes::new());
        let registry = Arc::new(CompletionRegistry::new());
        let shutdown = Arc::new(ShutdownController::new());
        let dispatcher = Arc::new(BatchDispatcher::new(
            classifier,
            Arc::clone(&registry),
            config.clone(),
        ));
        let admission = Admission::new(
            PriorityPolicy::new(config.priority_threshold),
            Arc::clone(&lanes),
            Arc::clone(&registry),
            Arc::clone(&shutdown),
        );

        Ok(Self {
            config,
            lanes,
            registry,
            shutdown,
            dispatcher,
            admission,
            scheduler: Mutex::new(None),
        })
    }

    /// Launches the fixed worker pool. Calling it again while running, or
    /// once shutdown has begun, is a no-op.
    pub fn on_startup(&self) {
        let mut scheduler = self.scheduler.lock();
        if !self.shutdown.is_accepting() {
            warn!(
                state = self.shutdown.health_state().as_str(),
                "service is shutting down; not starting batch workers"
            );
            return;
        }
        if scheduler.is_some() {
            warn!("batch workers already running");
            return;
        }
        *scheduler = Some(BatchScheduler::start(
            &self.config,
            Arc::clone(&self.lanes),
            Arc::clone(&self.dispatcher),
            &self.shutdown.stop_receiver(),
        ));
        // A drain that raced us stays in force; `on_shutdown` will take and
        // join this pool once we release the lock.
        if !self.shutdown.set_ready() {
            warn!("shutdown began during startup");
        }
    }

    /// Drains and stops the service.
    ///
    /// Blocks until both lanes are empty and every admitted caller has its
    /// result, then lets every worker finish its current cycle and joins it.
    /// In-flight downstream calls are not cancelled.
    pub async fn on_shutdown(&self) {
        self.shutdown.begin_drain();
        let (high, low) = self.lanes.lane_lens();
        info!(pending_high = high, pending_low = low, "draining request lanes");

        let scheduler = self.scheduler.lock().take();
        if scheduler.is_none() && !self.lanes.is_empty() {
            // Nothing would ever drain the lanes otherwise.
            warn!("shutdown before startup; starting workers to drain lanes");
        }
        let scheduler = scheduler.unwrap_or_else(|| {
            BatchScheduler::start(
                &self.config,
                Arc::clone(&self.lanes),
                Arc::clone(&self.dispatcher),
                &self.shutdown.stop_receiver(),
            )
        });

        self.shutdown.wait_for_drain(&self.lanes).await;
        self.shutdown.signal_stop();
        scheduler.join().await;
        self.shutdown.mark_stopped();
        info!("all requests processed, shutdown complete");
    }

    /// Classifies one payload; see [`Admission::classify`].
    ///
    /// # Errors
    ///
    /// Propagates the admission path's `ClassifyError`.
    pub async fn classify(&self, sequence: String) -> Result<String, ClassifyError> {
        self.admission.classify(sequence).await
    }

    #[must_use]
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    #[must_use]
    pub fn lanes(&self) -> &PriorityLanes {
        &self.lanes
    }

    #[must_use]
    pub fn registry(&self) -> &CompletionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }
}
