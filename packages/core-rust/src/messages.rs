//! JSON bodies exchanged with callers and with the downstream service.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound (caller -> proxy)
// ---------------------------------------------------------------------------

/// Body of `POST /proxy_classify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyClassifyRequest {
    pub sequence: String,
}

/// Successful answer to `POST /proxy_classify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyClassifyResponse {
    pub result: String,
}

// ---------------------------------------------------------------------------
// Outbound (proxy -> downstream classifier)
// ---------------------------------------------------------------------------

/// Body posted to the downstream service for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyBatchRequest {
    pub sequences: Vec<String>,
}

/// Downstream answer: one label per sequence, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyBatchResponse {
    pub results: Vec<String>,
}
