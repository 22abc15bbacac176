//! Fixed-size pool of batch workers.
//!
//! Each worker loops: drain a batch, dispatch it, wait for the dispatch to
//! finish, then sleep for an interval that grows with the backlog. Workers
//! may race to drain the same lanes; the lane mutex guarantees no request
//! is handed out twice.

use std::sync::Arc;

use batchgate_core::{Batch, PriorityLanes};
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use super::config::BatcherConfig;
use super::dispatch::{usize_to_f64, BatchDispatcher};

/// Handle to the running worker pool.
pub struct BatchScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl BatchScheduler {
    /// Spawns `config.concurrent_workers` worker tasks.
    ///
    /// Workers run until `stop` flips to `true`; they check it between
    /// iterations and while sleeping, never mid-dispatch.
    #[must_use]
    pub fn start(
        config: &BatcherConfig,
        lanes: Arc<PriorityLanes>,
        dispatcher: Arc<BatchDispatcher>,
        stop: &watch::Receiver<bool>,
    ) -> Self {
        let handles = (0..config.concurrent_workers)
            .map(|worker| {
                let worker_loop = WorkerLoop {
                    worker,
                    config: config.clone(),
                    lanes: Arc::clone(&lanes),
                    dispatcher: Arc::clone(&dispatcher),
                    stop: stop.clone(),
                };
                tokio::spawn(worker_loop.run().instrument(info_span!("batch_worker", worker)))
            })
            .collect();

        info!(workers = config.concurrent_workers, "batch workers started");
        Self { handles }
    }

    /// Number of worker tasks launched.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to exit. The stop signal must already have
    /// been sent.
    pub async fn join(self) {
        for (worker, result) in join_all(self.handles).await.into_iter().enumerate() {
            if let Err(err) = result {
                error!(worker, error = %err, "batch worker terminated abnormally");
            }
        }
        info!("batch workers stopped");
    }
}

struct WorkerLoop {
    worker: usize,
    config: BatcherConfig,
    lanes: Arc<PriorityLanes>,
    dispatcher: Arc<BatchDispatcher>,
    stop: watch::Receiver<bool>,
}

impl WorkerLoop {
    async fn run(mut self) {
        let draw_size = self.config.draw_size();

        while !*self.stop.borrow() {
            if let Some(batch) = Batch::new(self.lanes.drain_batch(draw_size)) {
                let batch_size = batch.len();
                let report = self.dispatcher.dispatch(self.worker, batch).await;
                debug!(
                    batch_size,
                    attempts = report.attempts,
                    succeeded = report.succeeded,
                    "dispatch finished"
                );
            }

            let pending = self.lanes.len();
            metrics::gauge!("batchgate_queue_depth").set(usize_to_f64(pending));

            let interval = self.config.adaptive_interval(pending);
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                changed = self.stop.changed() => {
                    // Sender dropped: nobody can stop us any more, so stop now.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("worker exiting");
    }
}
