//! # Self-tuning Bounded Executor
//!
//! A worker pool for fire-and-forget async tasks that applies backpressure
//! to submitters and sizes itself from observed task latency.
//!
//! ## Features
//!
//! - **Admission control**: `submit` waits once running + queued tasks reach
//!   `pool_size`, so the queue can never grow without bound
//! - **Adaptive sizing**: each task finishing under the latency threshold
//!   grows the effective pool by one, each task at or over it shrinks the
//!   pool by one, within `[1, pool_size]`
//! - **Idle reclamation**: adaptive workers idle for twice the threshold exit
//! - **Drain and shutdown**: wait for outstanding work, give stragglers a
//!   grace period, then cancel what is left and report it
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     AdaptiveExecutor                         │
//! │  SizingController (ExecutionHooks): times tasks, decides     │
//! │  grow / shrink, returns or withholds permits                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ composes
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BoundedExecutor                          │
//! │  PermitStore ──► FIFO queue ──► workers (tokio tasks)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use autoscale_executor::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ExecutorError> {
//! let config = ExecutorConfig::new(8).with_task_timeout(Duration::from_millis(500));
//! let executor = AdaptiveExecutor::new(config)?;
//!
//! for page in 0..32 {
//!     executor.submit(async move {
//!         tracing::debug!(page, "fetching");
//!     }).await?;
//! }
//!
//! let report = executor.drain_and_shutdown().await;
//! assert!(report.graceful);
//! # Ok(())
//! # }
//! ```

pub mod adaptive;
pub mod config;
pub mod error;
pub mod hooks;
pub mod naming;
pub mod permits;
pub mod pool;
pub mod sizing;

/// Prelude for common imports
pub mod prelude {
    pub use crate::adaptive::AdaptiveExecutor;
    pub use crate::config::ExecutorConfig;
    pub use crate::error::{ExecutorError, RejectReason};
    pub use crate::hooks::{ExecutionHooks, PoolControl, TaskOutcome};
    pub use crate::pool::{BoundedExecutor, ShutdownReport};
}

// Re-export key types at crate root
pub use adaptive::AdaptiveExecutor;
pub use config::ExecutorConfig;
pub use error::{ExecutorError, RejectReason, Result};
pub use hooks::{ExecutionHooks, PoolControl, ReleasePermit, TaskOutcome};
pub use naming::{WorkerId, WorkerNamer};
pub use pool::{BoundedExecutor, ShutdownReport, Task};
pub use sizing::{Latency, SizingDecision};
