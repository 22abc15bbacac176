//! Tower layers wrapped around every batchgate route.
//!
//! Layers are listed outermost first.

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::config::NetworkConfig;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer type produced by [`build_http_layers`].
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        CorsLayer,
        Stack<
            CompressionLayer,
            Stack<
                TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
            >,
        >,
    >,
>;

/// Builds the layer stack:
///
/// 1. `SetRequestId`: UUID v4 `x-request-id` unless the caller sent one
/// 2. `Trace`: one span per request, tagged with the request id
/// 3. `Compression`: gzip for clients that accept it
/// 4. `CORS`: origins from `NetworkConfig::cors_origins`
/// 5. `PropagateRequestId`: echoes `x-request-id` on the response
///
/// No timeout layer: a caller waits for its batch however long dispatch takes.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

/// `"*"` anywhere in `origins` allows every origin; otherwise only the
/// listed ones. Entries that are not valid header values are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
