//! Admission-bounded worker pool
//!
//! Bounds the total of running and queued tasks with a [`PermitStore`] and
//! runs admitted tasks on a set of long-lived workers.
//!
//! ```text
//!  submit ──► PermitStore::acquire ──► dispatch ──┬─► new worker (below core size)
//!   (waits when no permits)                       └─► FIFO queue ──► idle worker
//!
//!  worker: before_execute ─► task ─► after_execute (returns or keeps the permit)
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, debug_span, error, instrument, trace, warn, Instrument};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, RejectReason, Result};
use crate::hooks::{ExecutionHooks, PoolControl, ReleasePermit, TaskOutcome};
use crate::naming::{WorkerId, WorkerNamer};
use crate::permits::PermitStore;

/// A unit of work as stored by the pool
pub type Task = BoxFuture<'static, ()>;

/// Worker lifetime policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolOptions {
    /// How long an idle worker waits for work before it may exit
    pub keep_alive: Option<Duration>,
    /// Whether workers within the core size may idle out too
    pub allow_core_timeout: bool,
}

impl PoolOptions {
    /// Workers live until shutdown
    pub(crate) fn fixed() -> Self {
        Self {
            keep_alive: None,
            allow_core_timeout: false,
        }
    }
}

/// What happened during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// All workers stopped within the grace period
    pub graceful: bool,
    /// Running tasks cancelled after the grace period
    pub cancelled_running: usize,
    /// Queued tasks discarded after the grace period
    pub dropped_queued: usize,
}

struct PoolState {
    queue: VecDeque<Task>,
    core_size: usize,
    workers: usize,
    active: usize,
    shutdown: bool,
}

pub(crate) struct PoolCore {
    pub(crate) permits: PermitStore,
    state: Mutex<PoolState>,
    wakeup: Notify,
    hooks: Arc<dyn ExecutionHooks>,
    namer: WorkerNamer,
    options: PoolOptions,
    runtime: Handle,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl PoolCore {
    /// Hand an admitted task to a worker
    fn dispatch(self: &Arc<Self>, task: Task) -> std::result::Result<(), RejectReason> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(RejectReason::Shutdown);
        }

        if state.workers < state.core_size {
            state.workers += 1;
            state.active += 1;
            self.spawn_worker(Some(task));
            return Ok(());
        }

        state.queue.push_back(task);
        if state.workers == 0 {
            state.workers += 1;
            self.spawn_worker(None);
        } else {
            drop(state);
            self.wakeup.notify_one();
        }
        Ok(())
    }

    /// Start a worker; the caller has already counted it
    fn spawn_worker(self: &Arc<Self>, first: Option<Task>) {
        let id = self.namer.next_id();
        let span = debug_span!("worker", name = %id);
        let core = Arc::clone(self);
        self.tracker
            .spawn_on(core.run_worker(id, first).instrument(span), &self.runtime);
    }

    pub(crate) fn core_size(&self) -> usize {
        self.state.lock().core_size
    }

    pub(crate) fn set_core_size(self: &Arc<Self>, size: usize) {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.core_size, size);

        // Queued work gets new workers right away; surplus workers lapse
        // on their next idle expiry.
        if size > previous && !state.shutdown {
            let extra = state
                .queue
                .len()
                .min(size.saturating_sub(state.workers));
            for _ in 0..extra {
                state.workers += 1;
                self.spawn_worker(None);
            }
        }
        trace!(previous, core_size = size, "Core size updated");
    }

    async fn run_worker(self: Arc<Self>, id: WorkerId, mut first: Option<Task>) {
        debug!("Worker started");
        let mut exit = WorkerExit {
            core: &self,
            running: false,
            retired: false,
        };

        loop {
            let task = match first.take() {
                Some(task) => task,
                None => match self.next_task().await {
                    Some(task) => task,
                    None => {
                        exit.retired = true;
                        break;
                    }
                },
            };

            exit.running = true;
            self.run_task(&id, task).await;
            exit.running = false;
        }

        debug!("Worker exited");
    }

    async fn run_task(self: &Arc<Self>, id: &WorkerId, task: Task) {
        self.hooks.before_execute(id);

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => TaskOutcome::Cancelled,
            result = AssertUnwindSafe(task).catch_unwind() => match result {
                Ok(()) => TaskOutcome::Completed,
                Err(_) => TaskOutcome::Panicked,
            },
        };
        if outcome != TaskOutcome::Completed {
            warn!(%outcome, "Task did not complete");
        }

        self.hooks.after_execute(id, outcome, &PoolControl::new(self));
        self.state.lock().active -= 1;
    }

    /// Wait for the next queued task, or `None` when this worker should exit
    async fn next_task(&self) -> Option<Task> {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(task) = state.queue.pop_front() {
                    state.active += 1;
                    return Some(task);
                }
                if state.shutdown {
                    state.workers -= 1;
                    return None;
                }
            }

            let timed_out = match self.options.keep_alive {
                Some(keep_alive) => tokio::time::timeout(keep_alive, notified).await.is_err(),
                None => {
                    notified.await;
                    false
                }
            };

            if timed_out {
                let mut state = self.state.lock();
                if state.queue.is_empty()
                    && (self.options.allow_core_timeout || state.workers > state.core_size)
                {
                    state.workers -= 1;
                    trace!(workers = state.workers, "Idle worker reclaimed");
                    return None;
                }
            }
        }
    }

    async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        debug!("Attempting to shut down executor pool");
        self.state.lock().shutdown = true;
        self.wakeup.notify_waiters();
        self.tracker.close();

        let graceful = tokio::time::timeout(grace, self.tracker.wait())
            .await
            .is_ok();
        let mut report = ShutdownReport {
            graceful,
            cancelled_running: 0,
            dropped_queued: 0,
        };

        if !graceful {
            let (running, queued) = {
                let mut state = self.state.lock();
                (state.active, std::mem::take(&mut state.queue))
            };
            let dropped = queued.len();
            drop(queued);

            warn!(running, dropped, "Forcibly cancelling unfinished tasks");
            self.permits.release(dropped);
            report.cancelled_running = running;
            report.dropped_queued = dropped;
        }

        self.cancel.cancel();
        if !graceful && tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!("Workers still running after forced cancellation");
        }

        self.permits.close();
        debug!("Shutdown finished");
        report
    }
}

/// Keeps worker counts right when a worker stops without retiring
///
/// A worker lost to a panicking hook is replaced while admitted work is
/// still queued.
struct WorkerExit<'a> {
    core: &'a Arc<PoolCore>,
    running: bool,
    retired: bool,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        if self.retired {
            return;
        }

        {
            let mut state = self.core.state.lock();
            if self.running {
                state.active -= 1;
            }
            if !state.queue.is_empty() && !state.shutdown {
                self.core.spawn_worker(None);
                debug!(queued = state.queue.len(), "Replacing lost worker");
            } else {
                state.workers -= 1;
            }
        }

        if std::thread::panicking() {
            error!("Worker terminated by a panicking task hook");
        } else {
            debug!("Worker dropped before retiring");
        }
    }
}

/// Fixed-size worker pool with blocking admission
///
/// At most `pool_size` tasks are outstanding at once, running or queued.
/// [`submit`](Self::submit) waits for a permit; the permit goes back when
/// the task finishes, normally or by panicking.
///
/// Workers are tokio tasks spawned on the runtime the executor was created
/// in. They stay alive until [`shutdown`](Self::shutdown) or
/// [`drain_and_shutdown`](Self::drain_and_shutdown); dropping the executor
/// does not stop them.
///
/// # Example
///
/// ```
/// use autoscale_executor::{BoundedExecutor, ExecutorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), autoscale_executor::ExecutorError> {
/// let executor = BoundedExecutor::new(ExecutorConfig::new(4))?;
///
/// for i in 0..16 {
///     executor.submit(async move {
///         tracing::info!(i, "processing");
///     }).await?;
/// }
///
/// let report = executor.drain_and_shutdown().await;
/// assert!(report.graceful);
/// # Ok(())
/// # }
/// ```
pub struct BoundedExecutor {
    core: Arc<PoolCore>,
    config: ExecutorConfig,
}

impl BoundedExecutor {
    /// Create a pool that returns every permit on task completion
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        Self::with_hooks(config, Arc::new(ReleasePermit))
    }

    /// Create a pool with custom lifecycle hooks
    ///
    /// The hooks own permit release; see [`ExecutionHooks::after_execute`].
    pub fn with_hooks(config: ExecutorConfig, hooks: Arc<dyn ExecutionHooks>) -> Result<Self> {
        Self::with_options(config, hooks, PoolOptions::fixed())
    }

    pub(crate) fn with_options(
        config: ExecutorConfig,
        hooks: Arc<dyn ExecutionHooks>,
        options: PoolOptions,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;

        let core = Arc::new(PoolCore {
            permits: PermitStore::new(config.pool_size),
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                core_size: config.pool_size,
                workers: 0,
                active: 0,
                shutdown: false,
            }),
            wakeup: Notify::new(),
            hooks,
            namer: WorkerNamer::new(config.name_prefix.clone()),
            options,
            runtime,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        });

        debug!(
            pool_size = config.pool_size,
            keep_alive_ms = ?options.keep_alive.map(|d| d.as_millis()),
            "Created bounded executor"
        );

        Ok(Self { core, config })
    }

    /// Submit a task, waiting while the pool is at capacity
    ///
    /// Returns once the task is admitted, not when it finishes. Fails with
    /// [`ExecutorError::Rejected`] after shutdown has begun; the permit taken
    /// for the task is returned first.
    ///
    /// Cancel safe: dropping the future while it waits admits nothing.
    pub async fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.core
            .permits
            .acquire()
            .await
            .map_err(ExecutorError::Rejected)?;

        if let Err(reason) = self.core.dispatch(task.boxed()) {
            self.core.permits.release(1);
            debug!(%reason, "Submission rejected");
            return Err(ExecutorError::Rejected(reason));
        }
        Ok(())
    }

    /// Blocking variant of [`submit`](Self::submit) for synchronous callers
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.core.runtime.block_on(self.submit(task))
    }

    /// Wait until nothing is running or queued, then shut down
    ///
    /// Polls every `drain_poll_interval`, then stops the workers as
    /// [`shutdown`](Self::shutdown) does.
    #[instrument(skip(self), fields(pool = %self.config.name_prefix))]
    pub async fn drain_and_shutdown(&self) -> ShutdownReport {
        loop {
            let (active, queued) = {
                let state = self.core.state.lock();
                (state.active, state.queue.len())
            };
            if active == 0 && queued == 0 {
                break;
            }
            trace!(active, queued, "Waiting for executor to drain");
            tokio::time::sleep(self.config.drain_poll_interval).await;
        }

        self.core.shutdown(self.config.shutdown_grace).await
    }

    /// Stop accepting work and stop the workers
    ///
    /// Queued and running tasks get `shutdown_grace` to finish. After that,
    /// running tasks are cancelled at their next await point and queued
    /// tasks are discarded; both are counted in the report and logged as a
    /// warning. Every later submission is rejected.
    #[instrument(skip(self), fields(pool = %self.config.name_prefix))]
    pub async fn shutdown(&self) -> ShutdownReport {
        self.core.shutdown(self.config.shutdown_grace).await
    }

    /// Tasks currently executing
    pub fn active_count(&self) -> usize {
        self.core.state.lock().active
    }

    /// Live workers, busy or idle
    pub fn worker_count(&self) -> usize {
        self.core.state.lock().workers
    }

    /// Admitted tasks waiting for a worker
    pub fn queued_count(&self) -> usize {
        self.core.state.lock().queue.len()
    }

    /// Free admission permits
    pub fn available_permits(&self) -> usize {
        self.core.permits.available()
    }

    /// Maximum outstanding tasks
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Whether shutdown has begun
    pub fn is_shutdown(&self) -> bool {
        self.core.state.lock().shutdown
    }

    /// Configuration the pool was built with
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}
