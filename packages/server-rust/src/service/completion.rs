//! Completion registry: hands each published outcome to exactly one waiter.
//!
//! Every admitted request gets a one-shot slot keyed by its `RequestId`.
//! The dispatcher publishes into the sender half and the admission path
//! awaits the receiver half, so wake-up latency is bounded by dispatch
//! completion only. A one-shot channel buffers its value, which makes
//! publish-before-take safe.

use batchgate_core::{ClassifyResult, Outcome, RequestId};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Errors from registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id was never registered, or its outcome was already taken.
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),
    /// An outcome for this id was already published.
    #[error("outcome already published for request {0}")]
    AlreadyPublished(RequestId),
    /// Another caller is already waiting on this id.
    #[error("request {0} already has a waiter")]
    AlreadyWaiting(RequestId),
    /// The slot was dropped before any outcome was published.
    #[error("request {0} was abandoned without an outcome")]
    Abandoned(RequestId),
}

#[derive(Debug)]
struct Slot {
    tx: Option<oneshot::Sender<Outcome>>,
    rx: Option<oneshot::Receiver<Outcome>>,
}

/// Maps request ids to their eventual outcome.
#[derive(Debug, Default)]
pub struct CompletionRegistry {
    slots: DashMap<RequestId, Slot>,
}

impl CompletionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the slot for `id`. Must happen before the request is
    /// enqueued so the dispatcher always finds it.
    pub fn register(&self, id: RequestId) {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(
            id,
            Slot {
                tx: Some(tx),
                rx: Some(rx),
            },
        );
    }

    /// Stores the outcome and wakes the waiter, if any.
    ///
    /// # Errors
    ///
    /// `UnknownRequest` when no slot exists (never registered, or the
    /// waiter gave up), `AlreadyPublished` on a second publish.
    pub fn publish(&self, result: ClassifyResult) -> Result<(), RegistryError> {
        let id = result.request_id;
        let waiter_gone = {
            let mut slot = self
                .slots
                .get_mut(&id)
                .ok_or(RegistryError::UnknownRequest(id))?;
            let tx = slot.tx.take().ok_or(RegistryError::AlreadyPublished(id))?;
            // A dropped receiver means the caller went away mid-wait.
            let delivered = tx.send(result.outcome).is_ok();
            !delivered && slot.rx.is_none()
        };
        if waiter_gone {
            debug!(request_id = %id, "discarding outcome for departed caller");
            self.slots.remove(&id);
        }
        Ok(())
    }

    /// Waits for the outcome of `id`, then removes and returns it.
    ///
    /// Dropping the returned future before it resolves removes the slot, so
    /// a later publish is discarded.
    ///
    /// # Errors
    ///
    /// `UnknownRequest` for an unregistered or already-taken id,
    /// `AlreadyWaiting` if another `take` holds the receiver, `Abandoned` if
    /// the slot's sender was dropped without a publish.
    pub async fn take(&self, id: RequestId) -> Result<Outcome, RegistryError> {
        let rx = {
            let mut slot = self
                .slots
                .get_mut(&id)
                .ok_or(RegistryError::UnknownRequest(id))?;
            slot.rx.take().ok_or(RegistryError::AlreadyWaiting(id))?
        };

        let _cleanup = SlotCleanup { registry: self, id };
        rx.await.map_err(|_| RegistryError::Abandoned(id))
    }

    /// Number of requests registered but not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Removes a slot once its waiter finishes or is cancelled.
struct SlotCleanup<'a> {
    registry: &'a CompletionRegistry,
    id: RequestId,
}

impl Drop for SlotCleanup<'_> {
    fn drop(&mut self) {
        self.registry.slots.remove(&self.id);
    }
}
