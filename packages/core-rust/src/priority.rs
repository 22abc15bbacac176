//! Admission-time lane selection.

use crate::types::Priority;

/// Default payload length above which a request goes to the high lane.
pub const DEFAULT_PRIORITY_THRESHOLD: usize = 50;

/// Length-based heuristic that picks a lane for each incoming payload.
///
/// Payloads strictly longer than `threshold` characters are treated as
/// latency-sensitive and routed to the high lane. This is admission control,
/// not an SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPolicy {
    threshold: usize,
}

impl PriorityPolicy {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Picks the lane for `sequence`. Length is counted in Unicode scalar
    /// values, not bytes.
    #[must_use]
    pub fn classify(&self, sequence: &str) -> Priority {
        if sequence.chars().count() > self.threshold {
            Priority::High
        } else {
            Priority::Low
        }
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY_THRESHOLD)
    }
}
