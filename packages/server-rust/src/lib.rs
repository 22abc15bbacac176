//! `batchgate` server: priority batching proxy in front of a downstream
//! classification service.

pub mod downstream;
pub mod error;
pub mod network;
pub mod service;

pub use downstream::{DownstreamConfig, HttpClassifier};
pub use error::ClassifyError;
pub use network::{NetworkConfig, NetworkModule};
pub use service::{BatcherConfig, BatchingService};
