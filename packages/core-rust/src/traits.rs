use async_trait::async_trait;

use crate::error::DownstreamError;

/// The downstream classification service.
///
/// Implementations: HTTP (`batchgate-server::downstream`), scripted fakes
/// (tests).
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies `sequences` in one call.
    ///
    /// On success the returned labels are in the same order as `sequences`.
    /// Implementations are not required to check the length; the dispatcher
    /// treats a length mismatch as a failed attempt.
    async fn classify_batch(&self, sequences: &[String]) -> Result<Vec<String>, DownstreamError>;
}
