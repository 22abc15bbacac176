//! Request batching pipeline.
//!
//! 1. **Admission** (`admission`): lane selection, enqueue, one-shot wait
//! 2. **Scheduling** (`scheduler`): fixed worker pool draining the lanes
//! 3. **Dispatch** (`dispatch`): downstream call with whole-batch retry
//! 4. **Completion** (`completion`): request id -> outcome hand-off
//! 5. **Shutdown** (`shutdown`): lifecycle state, drain, worker stop signal
//!
//! `BatchingService` (`batching`) wires them together.

pub mod admission;
pub mod batching;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod scheduler;
pub mod shutdown;

// Re-export key types for convenient access.
pub use admission::Admission;
pub use batching::BatchingService;
pub use completion::{CompletionRegistry, RegistryError};
pub use config::{BatcherConfig, ConfigError};
pub use dispatch::{BatchDispatcher, DispatchReport, FAILURE_REASON};
pub use scheduler::BatchScheduler;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
