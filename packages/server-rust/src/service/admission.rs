//! Admission path: lane selection, enqueue, and the caller's wait.

use std::sync::Arc;

use batchgate_core::{ClassifyRequest, Outcome, PriorityLanes, PriorityPolicy};
use tracing::{debug, Instrument};

use super::completion::CompletionRegistry;
use super::shutdown::ShutdownController;
use crate::error::ClassifyError;

/// Accepts individual requests and suspends each caller until its outcome
/// is published.
pub struct Admission {
    policy: PriorityPolicy,
    lanes: Arc<PriorityLanes>,
    registry: Arc<CompletionRegistry>,
    shutdown: Arc<ShutdownController>,
}

impl Admission {
    #[must_use]
    pub fn new(
        policy: PriorityPolicy,
        lanes: Arc<PriorityLanes>,
        registry: Arc<CompletionRegistry>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            policy,
            lanes,
            registry,
            shutdown,
        }
    }

    /// Classifies `sequence` through the batching pipeline.
    ///
    /// The wait is a one-shot await on the request's completion slot with no
    /// timeout; it resolves when the dispatcher publishes.
    ///
    /// # Errors
    ///
    /// `ShuttingDown` once draining has begun (nothing is enqueued),
    /// `Failed` when the request's batch exhausted its retries, `Registry`
    /// if the completion slot was lost.
    pub async fn classify(&self, sequence: String) -> Result<String, ClassifyError> {
        // Count the caller before the check so a concurrent drain either
        // rejects us here or waits for our result.
        let _in_flight = self.shutdown.in_flight_guard();
        if !self.shutdown.is_accepting() {
            return Err(ClassifyError::ShuttingDown);
        }

        let priority = self.policy.classify(&sequence);
        let request = ClassifyRequest::new(sequence, priority);
        let id = request.id;

        // Register first so the dispatcher always finds the slot.
        self.registry.register(id);
        self.lanes.enqueue(request);
        metrics::counter!("batchgate_requests_admitted_total", "priority" => priority.as_str())
            .increment(1);

        let span = tracing::debug_span!("await_result", request_id = %id, priority = priority.as_str());
        let outcome = async {
            debug!("request enqueued");
            self.registry.take(id).await
        }
        .instrument(span)
        .await?;

        match outcome {
            Outcome::Success(label) => Ok(label),
            Outcome::Failure(reason) => Err(ClassifyError::Failed { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use batchgate_core::{ClassifyResult, Priority};

    use super::*;

    fn admission() -> (Admission, Arc<PriorityLanes>, Arc<CompletionRegistry>, Arc<ShutdownController>) {
        let lanes = Arc::new(PriorityLanes::new());
        let registry = Arc::new(CompletionRegistry::new());
        let shutdown = Arc::new(ShutdownController::new());
        let admission = Admission::new(
            PriorityPolicy::default(),
            Arc::clone(&lanes),
            Arc::clone(&registry),
            Arc::clone(&shutdown),
        );
        (admission, lanes, registry, shutdown)
    }

    /// Drains one request by hand and publishes `outcome` for it.
    async fn complete_next(
        lanes: &PriorityLanes,
        registry: &CompletionRegistry,
        outcome: Outcome,
    ) -> ClassifyRequest {
        loop {
            if let Some(request) = lanes.drain_batch(1).pop() {
                registry
                    .publish(ClassifyResult {
                        request_id: request.id,
                        outcome,
                    })
                    .unwrap();
                return request;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn success_returns_label_and_clears_slot() {
        let (admission, lanes, registry, shutdown) = admission();

        let (result, request) = tokio::join!(
            admission.classify("x".repeat(60)),
            complete_next(&lanes, &registry, Outcome::Success("code".to_string())),
        );

        assert_eq!(result, Ok("code".to_string()));
        assert_eq!(request.priority, Priority::High);
        assert!(registry.is_empty());
        assert_eq!(shutdown.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn short_payload_goes_to_low_lane() {
        let (admission, lanes, registry, _shutdown) = admission();

        let (_result, request) = tokio::join!(
            admission.classify("short".to_string()),
            complete_next(&lanes, &registry, Outcome::Success("x".to_string())),
        );

        assert_eq!(request.priority, Priority::Low);
        assert_eq!(request.sequence, "short");
    }

    #[tokio::test]
    async fn failure_surfaces_as_error() {
        let (admission, lanes, registry, _shutdown) = admission();

        let (result, _request) = tokio::join!(
            admission.classify("payload".to_string()),
            complete_next(
                &lanes,
                &registry,
                Outcome::Failure("classification failed".to_string())
            ),
        );

        assert_eq!(
            result,
            Err(ClassifyError::Failed {
                reason: "classification failed".to_string()
            })
        );
    }

    #[tokio::test]
    async fn draining_rejects_without_enqueueing() {
        let (admission, lanes, registry, shutdown) = admission();
        assert!(shutdown.set_ready());
        shutdown.begin_drain();

        let result = admission.classify("late".to_string()).await;

        assert_eq!(result, Err(ClassifyError::ShuttingDown));
        assert!(lanes.is_empty());
        assert!(registry.is_empty());
        assert_eq!(shutdown.in_flight_count(), 0);
    }
}
