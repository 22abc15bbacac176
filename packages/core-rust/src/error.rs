//! Errors reported by downstream classifier implementations.

/// Failure of a single downstream `classify_batch` attempt.
///
/// The dispatcher retries every variant identically; the distinction exists
/// for logging only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownstreamError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("downstream unavailable: {0}")]
    Unavailable(String),
    /// The service answered with a non-success status.
    #[error("downstream returned status {status}")]
    BadResponse { status: u16 },
    /// The response body was not the expected JSON shape.
    #[error("downstream response could not be decoded: {0}")]
    Decode(String),
    /// The service returned a different number of labels than sequences sent.
    #[error("downstream returned {actual} labels for {expected} sequences")]
    LengthMismatch { expected: usize, actual: usize },
}
