//! `POST /proxy_classify`: one caller, one sequence, one label.

use axum::extract::State;
use axum::Json;
use batchgate_core::messages::{ProxyClassifyRequest, ProxyClassifyResponse};

use super::AppState;
use crate::error::ClassifyError;

/// Admits the request into the batching pipeline and waits for its label.
///
/// Downstream exhaustion maps to 502 and a draining server to 503, both
/// with a JSON error body.
///
/// # Errors
///
/// Returns `ClassifyError`, rendered through its `IntoResponse` impl.
pub async fn proxy_classify_handler(
    State(state): State<AppState>,
    Json(req): Json<ProxyClassifyRequest>,
) -> Result<Json<ProxyClassifyResponse>, ClassifyError> {
    let result = state.service.classify(req.sequence).await?;
    Ok(Json(ProxyClassifyResponse { result }))
}
