//! HTTP handler definitions for the batchgate server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod classify;
pub mod health;

pub use classify::proxy_classify_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use crate::service::BatchingService;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Batching pipeline every classification request goes through.
    pub service: Arc<BatchingService>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
