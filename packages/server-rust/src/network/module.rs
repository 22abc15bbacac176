//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` launches the batch
//! workers and starts accepting connections.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, proxy_classify_handler, readiness_handler, AppState,
};
use super::middleware::build_http_layers;
use crate::service::BatchingService;

/// Manages the HTTP server lifecycle around a `BatchingService`.
///
/// 1. `new()` -- holds the config and the shared service
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- runs workers and HTTP until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    service: Arc<BatchingService>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<BatchingService>) -> Self {
        Self {
            config,
            listener: None,
            service,
        }
    }

    /// Returns a shared reference to the batching service.
    #[must_use]
    pub fn service(&self) -> Arc<BatchingService> {
        Arc::clone(&self.service)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /proxy_classify` -- classify one sequence through the batcher
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    pub fn build_router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/proxy_classify", post(proxy_classify_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Launches the batch workers and serves HTTP until `shutdown` resolves.
    ///
    /// After the shutdown signal:
    /// 1. Admission closes (new requests get 503)
    /// 2. Open HTTP requests finish; the workers keep running for them
    /// 3. The lanes drain and the workers are joined
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let service = self.service;

        service.on_startup();

        let controller = service.shutdown_controller();
        let signal = async move {
            shutdown.await;
            info!("shutdown signal received, closing admission");
            controller.begin_drain();
        };

        info!("Serving HTTP connections");
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await;

        // Drain even if the server loop failed, so queued callers resolve.
        service.on_shutdown().await;
        served?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use batchgate_core::messages::ProxyClassifyResponse;
    use batchgate_core::{Classifier, DownstreamError};
    use tower::ServiceExt;

    use super::*;
    use crate::service::BatcherConfig;

    /// Labels long sequences "long" and everything else "short".
    struct LengthClassifier;

    #[async_trait]
    impl Classifier for LengthClassifier {
        async fn classify_batch(
            &self,
            sequences: &[String],
        ) -> Result<Vec<String>, DownstreamError> {
            Ok(sequences
                .iter()
                .map(|s| (if s.len() > 50 { "long" } else { "short" }).to_string())
                .collect())
        }
    }

    /// Always fails.
    struct DownClassifier;

    #[async_trait]
    impl Classifier for DownClassifier {
        async fn classify_batch(&self, _: &[String]) -> Result<Vec<String>, DownstreamError> {
            Err(DownstreamError::BadResponse { status: 500 })
        }
    }

    fn module(classifier: Arc<dyn Classifier>) -> NetworkModule {
        let service = BatchingService::new(BatcherConfig::default(), classifier).unwrap();
        NetworkModule::new(NetworkConfig::default(), Arc::new(service))
    }

    fn classify_request(sequence: &str) -> Request<Body> {
        Request::post("/proxy_classify")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "sequence": sequence }).to_string(),
            ))
            .unwrap()
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module(Arc::new(LengthClassifier));
        assert!(module.listener.is_none());
    }

    #[test]
    fn service_returns_shared_arc() {
        let module = module(Arc::new(LengthClassifier));
        assert!(Arc::ptr_eq(&module.service(), &module.service()));
    }

    #[tokio::test]
    async fn proxy_classify_returns_label() {
        let module = module(Arc::new(LengthClassifier));
        module.service().on_startup();

        let response = module
            .build_router()
            .oneshot(classify_request(&"a".repeat(70)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ProxyClassifyResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.result, "long");

        module.service().on_shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_map_to_bad_gateway() {
        let module = module(Arc::new(DownClassifier));
        module.service().on_startup();

        let response = module
            .build_router()
            .oneshot(classify_request("short"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["message"], "classification failed");

        module.service().on_shutdown().await;
    }

    #[tokio::test]
    async fn draining_service_returns_503() {
        let module = module(Arc::new(LengthClassifier));
        module.service().on_startup();
        module.service().on_shutdown().await;

        let response = module
            .build_router()
            .oneshot(classify_request("late"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_admission() {
        let module = module(Arc::new(LengthClassifier));

        let response = module
            .build_router()
            .oneshot(
                Request::post("/proxy_classify")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"text\": 1}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(module.service().lanes().is_empty());
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module(Arc::new(LengthClassifier));
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_drains_and_stops_on_signal() {
        let mut module = module(Arc::new(LengthClassifier));
        module.start().await.unwrap();
        let service = module.service();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(
            service.shutdown_controller().health_state(),
            crate::service::HealthState::Stopped
        );
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let module = module(Arc::new(LengthClassifier));
        let _ = module.serve(std::future::pending::<()>()).await;
    }
}
