//! Batch dispatcher: one downstream call per attempt, whole-batch retry.
//!
//! A batch either succeeds as a unit on some attempt or every request in it
//! is marked failed. Partial success inside a batch is not tracked and no
//! request is retried on its own.

use std::sync::Arc;

use batchgate_core::{Batch, Classifier, ClassifyResult, DownstreamError, Outcome};
use tracing::{debug, error, warn};

use super::completion::CompletionRegistry;
use super::config::BatcherConfig;

/// Reason published to every request of a batch that exhausted its retries.
pub const FAILURE_REASON: &str = "classification failed";

/// Summary of one dispatch, returned to the worker for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Downstream calls made, including the successful one.
    pub attempts: u32,
    /// Whether the batch was eventually classified.
    pub succeeded: bool,
}

/// Sends batches downstream and publishes one outcome per request.
pub struct BatchDispatcher {
    classifier: Arc<dyn Classifier>,
    registry: Arc<CompletionRegistry>,
    max_attempts: u32,
    config: BatcherConfig,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(
        classifier: Arc<dyn Classifier>,
        registry: Arc<CompletionRegistry>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            classifier,
            registry,
            max_attempts: config.max_retries.max(1),
            config,
        }
    }

    /// Dispatches `batch`, retrying with exponential backoff.
    ///
    /// Makes at most `max_retries` downstream calls. After the `n`-th failure
    /// it sleeps `retry_backoff * 2^n` before trying again; there is no sleep
    /// after the final failure. Never returns an error: exhaustion is
    /// published as `Outcome::Failure` for every request in the batch.
    pub async fn dispatch(&self, worker: usize, batch: Batch) -> DispatchReport {
        let sequences = batch.sequences();
        metrics::histogram!("batchgate_batch_size").record(usize_to_f64(batch.len()));

        let mut failures = 0;
        loop {
            let attempt = failures + 1;
            match self.call_once(&sequences).await {
                Ok(labels) => {
                    debug!(worker, attempt, batch_size = batch.len(), "batch classified");
                    metrics::counter!("batchgate_batches_dispatched_total").increment(1);
                    self.publish_all(&batch, labels.into_iter().map(Outcome::Success));
                    return DispatchReport {
                        attempts: attempt,
                        succeeded: true,
                    };
                }
                Err(err) => {
                    failures = attempt;
                    if failures >= self.max_attempts {
                        error!(
                            worker,
                            attempts = failures,
                            batch_size = batch.len(),
                            error = %err,
                            "retries exhausted, failing batch"
                        );
                        break;
                    }
                    let delay = self.config.backoff_for(failures);
                    warn!(
                        worker,
                        attempt,
                        error = %err,
                        backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "downstream call failed, retrying"
                    );
                    metrics::counter!("batchgate_dispatch_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        metrics::counter!("batchgate_batches_failed_total").increment(1);
        self.publish_all(
            &batch,
            std::iter::repeat_with(|| Outcome::Failure(FAILURE_REASON.to_string())),
        );
        DispatchReport {
            attempts: failures,
            succeeded: false,
        }
    }

    /// One downstream call; a label count that differs from the batch size
    /// counts as a failed attempt.
    async fn call_once(&self, sequences: &[String]) -> Result<Vec<String>, DownstreamError> {
        let labels = self.classifier.classify_batch(sequences).await?;
        if labels.len() != sequences.len() {
            return Err(DownstreamError::LengthMismatch {
                expected: sequences.len(),
                actual: labels.len(),
            });
        }
        Ok(labels)
    }

    fn publish_all(&self, batch: &Batch, outcomes: impl Iterator<Item = Outcome>) {
        for (request_id, outcome) in batch.ids().zip(outcomes) {
            if let Err(err) = self.registry.publish(ClassifyResult {
                request_id,
                outcome,
            }) {
                // The caller stopped waiting; nothing left to deliver to.
                debug!(request_id = %request_id, error = %err, "outcome not delivered");
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn usize_to_f64(n: usize) -> f64 {
    n as f64
}
