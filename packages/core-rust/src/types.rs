use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier assigned to every admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lane a request is queued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Drained before any low-priority request.
    High,
    /// Fills whatever room a batch has left after the high lane.
    Low,
}

impl Priority {
    /// Returns the lowercase label used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

/// A single classification request waiting in a lane.
///
/// Immutable once enqueued. The queue store hands each request to exactly
/// one worker.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    /// Identifier the caller waits on.
    pub id: RequestId,
    /// Text payload forwarded downstream.
    pub sequence: String,
    /// Lane chosen at admission.
    pub priority: Priority,
    /// When the request entered its lane.
    pub enqueued_at: Instant,
}

impl ClassifyRequest {
    /// Creates a request with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(sequence: String, priority: Priority) -> Self {
        Self {
            id: RequestId::new(),
            sequence,
            priority,
            enqueued_at: Instant::now(),
        }
    }
}

/// Final outcome of a request, published exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Label returned by the downstream classifier.
    Success(String),
    /// Terminal failure with a human-readable reason.
    Failure(String),
}

impl Outcome {
    /// Returns `true` for `Outcome::Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A request id paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyResult {
    pub request_id: RequestId,
    pub outcome: Outcome,
}

/// Ordered, non-empty group of requests dispatched in one downstream call.
///
/// The constructor rejects empty input, so a `Batch` in hand always has at
/// least one request.
#[derive(Debug, Clone)]
pub struct Batch {
    requests: Vec<ClassifyRequest>,
}

impl Batch {
    /// Wraps the drained requests, or returns `None` when there are none.
    #[must_use]
    pub fn new(requests: Vec<ClassifyRequest>) -> Option<Self> {
        if requests.is_empty() {
            None
        } else {
            Some(Self { requests })
        }
    }

    /// Number of requests in the batch (always at least 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Requests in assembly order.
    #[must_use]
    pub fn requests(&self) -> &[ClassifyRequest] {
        &self.requests
    }

    /// Payloads in assembly order, as sent downstream.
    #[must_use]
    pub fn sequences(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.sequence.clone()).collect()
    }

    /// Request ids in assembly order.
    pub fn ids(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.requests.iter().map(|r| r.id)
    }
}
