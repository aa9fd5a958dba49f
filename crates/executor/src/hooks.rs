//! Task lifecycle hooks
//!
//! The bounded pool calls an [`ExecutionHooks`] implementation around every
//! task. The completion hook decides what happens to the task's permit; the
//! pool itself never returns permits on its own.

use std::sync::Arc;

use serde::Serialize;

use crate::naming::WorkerId;
use crate::pool::PoolCore;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task ran to completion
    Completed,
    /// The task panicked; the panic was contained by the worker
    Panicked,
    /// The task was cancelled by a forced shutdown
    Cancelled,
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Panicked => write!(f, "panicked"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Callbacks invoked by a worker around each task it runs
///
/// Both hooks run on the worker that executes the task, never concurrently
/// for the same worker. `after_execute` runs for every task that started,
/// whatever its [`TaskOutcome`].
pub trait ExecutionHooks: Send + Sync + 'static {
    /// Called immediately before the task is first polled
    fn before_execute(&self, _worker: &WorkerId) {}

    /// Called immediately after the task finished
    ///
    /// Owns the task's permit: an implementation that does not call
    /// [`PoolControl::release_permits`] shrinks the pool's capacity by one.
    fn after_execute(&self, worker: &WorkerId, outcome: TaskOutcome, pool: &PoolControl<'_>);
}

/// Handle a hook gets on the pool that called it
pub struct PoolControl<'a> {
    core: &'a Arc<PoolCore>,
}

impl<'a> PoolControl<'a> {
    pub(crate) fn new(core: &'a Arc<PoolCore>) -> Self {
        Self { core }
    }

    /// Return `n` permits to the admission store
    pub fn release_permits(&self, n: usize) {
        self.core.permits.release(n);
    }

    /// Set the number of workers the pool keeps without idling them out
    pub fn set_core_size(&self, size: usize) {
        self.core.set_core_size(size);
    }

    /// Current core worker count
    pub fn core_size(&self) -> usize {
        self.core.core_size()
    }

    /// Free permits right now
    pub fn available_permits(&self) -> usize {
        self.core.permits.available()
    }
}

/// Default completion hook: every finished task returns its permit
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleasePermit;

impl ExecutionHooks for ReleasePermit {
    fn after_execute(&self, _worker: &WorkerId, _outcome: TaskOutcome, pool: &PoolControl<'_>) {
        pool.release_permits(1);
    }
}
