//! Two-lane FIFO store for pending requests.
//!
//! Every operation takes the lane mutex exactly once and never blocks or
//! awaits while holding it, so callers on any thread or task can share one
//! `PriorityLanes` behind an `Arc`.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::{ClassifyRequest, Priority};

#[derive(Debug, Default)]
struct Lanes {
    high: VecDeque<ClassifyRequest>,
    low: VecDeque<ClassifyRequest>,
}

/// Pending requests split into a high and a low FIFO lane.
#[derive(Debug, Default)]
pub struct PriorityLanes {
    inner: Mutex<Lanes>,
}

impl PriorityLanes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `request` to the lane named by its priority.
    pub fn enqueue(&self, request: ClassifyRequest) {
        let mut lanes = self.inner.lock();
        match request.priority {
            Priority::High => lanes.high.push_back(request),
            Priority::Low => lanes.low.push_back(request),
        }
    }

    /// Removes up to `max_size` requests, exhausting the high lane before
    /// taking anything from the low lane. Returned in removal order.
    pub fn drain_batch(&self, max_size: usize) -> Vec<ClassifyRequest> {
        let mut lanes = self.inner.lock();

        let from_high = max_size.min(lanes.high.len());
        let from_low = (max_size - from_high).min(lanes.low.len());

        let mut batch = Vec::with_capacity(from_high + from_low);
        batch.extend(lanes.high.drain(..from_high));
        batch.extend(lanes.low.drain(..from_low));
        batch
    }

    /// Total number of pending requests across both lanes.
    #[must_use]
    pub fn len(&self) -> usize {
        let lanes = self.inner.lock();
        lanes.high.len() + lanes.low.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending counts as `(high, low)`, read under one lock acquisition.
    #[must_use]
    pub fn lane_lens(&self) -> (usize, usize) {
        let lanes = self.inner.lock();
        (lanes.high.len(), lanes.low.len())
    }
}
