//! HTTP client for the downstream classification service.

use std::time::Duration;

use async_trait::async_trait;
use batchgate_core::messages::{ClassifyBatchRequest, ClassifyBatchResponse};
use batchgate_core::{Classifier, DownstreamError};
use reqwest::Client;
use tracing::{debug, instrument};

/// Default endpoint of the downstream classifier.
pub const DEFAULT_DOWNSTREAM_URL: &str = "http://localhost:8001/classify";

/// Downstream client configuration.
#[derive(Debug, Clone)]
pub struct DownstreamConfig {
    /// Full URL batches are posted to.
    pub url: String,
    /// Per-call timeout; an expired call counts as `Unavailable` and is
    /// retried by the dispatcher.
    pub request_timeout: Duration,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DOWNSTREAM_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// `Classifier` that posts `{"sequences": [...]}` and expects
/// `{"results": [...]}` with a 200 status.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: &DownstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[instrument(skip(self, sequences), fields(batch_size = sequences.len()))]
    async fn classify_batch(&self, sequences: &[String]) -> Result<Vec<String>, DownstreamError> {
        let body = ClassifyBatchRequest {
            sequences: sequences.to_vec(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DownstreamError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownstreamError::BadResponse {
                status: status.as_u16(),
            });
        }

        let parsed: ClassifyBatchResponse = response
            .json()
            .await
            .map_err(|e| DownstreamError::Decode(e.to_string()))?;
        debug!(labels = parsed.results.len(), "downstream responded");
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/classify")
    }

    fn client(url: String) -> HttpClassifier {
        HttpClassifier::new(&DownstreamConfig {
            url,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn default_points_at_local_service() {
        let config = DownstreamConfig::default();
        assert_eq!(config.url, "http://localhost:8001/classify");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn posts_sequences_and_parses_results() {
        let router = Router::new().route(
            "/classify",
            post(|Json(body): Json<ClassifyBatchRequest>| async move {
                Json(ClassifyBatchResponse {
                    results: body.sequences.iter().map(|s| s.to_uppercase()).collect(),
                })
            }),
        );
        let classifier = client(serve(router).await);

        let labels = classifier
            .classify_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn non_success_status_is_bad_response() {
        let router = Router::new().route(
            "/classify",
            post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let classifier = client(serve(router).await);

        let err = classifier.classify_batch(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err, DownstreamError::BadResponse { status: 503 });
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let router = Router::new().route("/classify", post(|| async { "not json" }));
        let classifier = client(serve(router).await);

        let err = classifier.classify_batch(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, DownstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let classifier = client(format!("http://{addr}/classify"));
        let err = classifier.classify_batch(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, DownstreamError::Unavailable(_)));
    }
}
