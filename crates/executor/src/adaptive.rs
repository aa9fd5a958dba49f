//! Self-tuning executor
//!
//! Wraps a [`BoundedExecutor`] with a completion hook that times every task
//! and resizes the pool one step at a time: fast tasks grow it back towards
//! `pool_size`, slow tasks shrink it towards a single worker. Shrinking works
//! by withholding the slow task's permit, growing by handing out an extra one,
//! so admission capacity always follows the effective size.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{error, info, instrument, trace};

use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::hooks::{ExecutionHooks, PoolControl, TaskOutcome};
use crate::naming::WorkerId;
use crate::pool::{BoundedExecutor, PoolOptions, ShutdownReport};
use crate::sizing::{keep_alive_for, Latency, SizingDecision};

/// Completion hook that owns the effective pool size
pub(crate) struct SizingController {
    max_pool_size: usize,
    threshold: Option<Duration>,
    /// Effective pool size; also serializes every permit decision
    current: Mutex<usize>,
    started: DashMap<WorkerId, Instant>,
}

impl SizingController {
    pub(crate) fn new(max_pool_size: usize, threshold: Option<Duration>) -> Self {
        Self {
            max_pool_size,
            threshold,
            current: Mutex::new(max_pool_size),
            started: DashMap::with_capacity(max_pool_size),
        }
    }

    pub(crate) fn current(&self) -> usize {
        *self.current.lock()
    }
}

impl ExecutionHooks for SizingController {
    fn before_execute(&self, worker: &WorkerId) {
        self.started.insert(worker.clone(), Instant::now());
    }

    fn after_execute(&self, worker: &WorkerId, outcome: TaskOutcome, pool: &PoolControl<'_>) {
        let mut current = self.current.lock();

        let finished = Instant::now();
        let Some((_, started)) = self.started.remove(worker) else {
            error!(%worker, "Task finished without a recorded start time");
            panic!("worker {worker} finished a task without a recorded start time");
        };
        let elapsed = finished.saturating_duration_since(started);

        let latency = Latency::classify(elapsed, self.threshold);
        let decision = SizingDecision::decide(*current, self.max_pool_size, latency);
        trace!(?elapsed, ?latency, %outcome, ?decision, "Task timed");

        // The task's own permit goes back before the resize, any extra after it
        let returned = decision.permits_returned();
        pool.release_permits(returned.min(1));

        let next = decision.next_size(*current);
        if next != *current {
            *current = next;
            pool.set_core_size(next);
        }
        pool.release_permits(returned.saturating_sub(1));

        match decision {
            SizingDecision::Grow { to } => info!(pool_size = to, "Increased pool size"),
            SizingDecision::Shrink { to } => info!(pool_size = to, "Reduced pool size"),
            SizingDecision::Release | SizingDecision::HoldAtFloor => {}
        }
        trace!(
            core_size = pool.core_size(),
            available = pool.available_permits(),
            "Sizing applied"
        );
    }
}

/// Bounded executor whose effective concurrency follows task latency
///
/// Starts at `pool_size`. Each task finishing under `task_timeout` adds one
/// slot (up to `pool_size`); each task finishing at or over it removes one
/// (down to 1). Idle workers are reclaimed after twice the threshold.
///
/// # Example
///
/// ```
/// use autoscale_executor::{AdaptiveExecutor, ExecutorConfig};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), autoscale_executor::ExecutorError> {
/// let config = ExecutorConfig::new(3).with_task_timeout(Duration::from_millis(100));
/// let executor = AdaptiveExecutor::new(config)?;
///
/// executor.submit(async {
///     tokio::time::sleep(Duration::from_millis(150)).await;
/// }).await?;
///
/// executor.drain_and_shutdown().await;
/// assert_eq!(executor.current_pool_size(), 2);
/// # Ok(())
/// # }
/// ```
pub struct AdaptiveExecutor {
    pool: BoundedExecutor,
    controller: Arc<SizingController>,
}

impl AdaptiveExecutor {
    /// Create an adaptive executor
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let threshold = config.threshold();
        let controller = Arc::new(SizingController::new(config.pool_size, threshold));
        let options = PoolOptions {
            keep_alive: keep_alive_for(threshold),
            allow_core_timeout: true,
        };

        info!(
            pool_size = config.pool_size,
            threshold_ms = ?threshold.map(|t| t.as_millis()),
            "Created adaptive executor"
        );

        let pool = BoundedExecutor::with_options(config, controller.clone(), options)?;
        Ok(Self { pool, controller })
    }

    /// Submit a task, waiting while the pool is at its effective capacity
    pub async fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.submit(task).await
    }

    /// Blocking variant of [`submit`](Self::submit)
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.blocking_submit(task)
    }

    /// Effective pool size, between 1 and [`max_pool_size`](Self::max_pool_size)
    pub fn current_pool_size(&self) -> usize {
        self.controller.current()
    }

    /// Ceiling for the effective pool size
    pub fn max_pool_size(&self) -> usize {
        self.pool.pool_size()
    }

    /// Tasks currently executing
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Live workers, busy or idle
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Admitted tasks waiting for a worker
    pub fn queued_count(&self) -> usize {
        self.pool.queued_count()
    }

    /// Free admission permits
    pub fn available_permits(&self) -> usize {
        self.pool.available_permits()
    }

    /// Whether shutdown has begun
    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Configuration the executor was built with
    pub fn config(&self) -> &ExecutorConfig {
        self.pool.config()
    }

    /// Wait until nothing is running or queued, then shut down
    #[instrument(skip(self), fields(pool_size = self.current_pool_size()))]
    pub async fn drain_and_shutdown(&self) -> ShutdownReport {
        self.pool.drain_and_shutdown().await
    }

    /// Stop accepting work and stop the workers without draining first
    pub async fn shutdown(&self) -> ShutdownReport {
        self.pool.shutdown().await
    }
}
