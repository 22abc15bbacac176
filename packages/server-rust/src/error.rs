//! Caller-facing errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::service::completion::RegistryError;

/// Why a `classify` call did not produce a label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The batch carrying this request exhausted its downstream retries.
    #[error("{reason}")]
    Failed { reason: String },
    /// The service is draining or stopped and no longer admits requests.
    #[error("service is shutting down")]
    ShuttingDown,
    /// The completion registry lost track of the request.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ClassifyError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "classification_failed",
            Self::ShuttingDown => "shutting_down",
            Self::Registry(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Failed { .. } => StatusCode::BAD_GATEWAY,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        }));
        (self.status(), body).into_response()
    }
}
