//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::service::HealthState;

/// Returns detailed health information as JSON.
///
/// Always returns 200 -- the `state` field in the response body indicates
/// whether the service is admitting requests.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let shutdown = state.service.shutdown_controller();
    let (pending_high, pending_low) = state.service.lanes().lane_lens();

    Json(json!({
        "state": shutdown.health_state().as_str(),
        "pending_high": pending_high,
        "pending_low": pending_low,
        "awaiting_results": state.service.registry().len(),
        "in_flight": shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe -- always returns 200 OK.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe -- returns 200 when the worker pool is running, 503
/// before startup and once draining has begun.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.service.shutdown_controller().health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
