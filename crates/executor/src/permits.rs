//! Counting permit store bounding outstanding work

use tokio::sync::Semaphore;
use tracing::trace;

use crate::error::RejectReason;

/// Counting semaphore sized to the pool capacity
///
/// One permit is one admitted task, queued or running. Permits are taken by
/// [`acquire`](Self::acquire) and returned explicitly by
/// [`release`](Self::release), never by dropping a guard: the adaptive
/// controller shrinks the pool by not returning a permit.
#[derive(Debug)]
pub struct PermitStore {
    semaphore: Semaphore,
    capacity: usize,
}

impl PermitStore {
    /// Create a store with `capacity` free permits
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Wait for and take one permit
    ///
    /// Cancel safe: dropping the future before it resolves takes nothing.
    /// Fails only once the store has been closed at pool termination.
    pub async fn acquire(&self) -> Result<(), RejectReason> {
        match self.semaphore.acquire().await {
            Ok(permit) => {
                permit.forget();
                trace!(available = self.available(), "Permit acquired");
                Ok(())
            }
            Err(_) => Err(RejectReason::Shutdown),
        }
    }

    /// Return `n` permits to the store
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.semaphore.add_permits(n);
        trace!(released = n, available = self.available(), "Permits released");
    }

    /// Number of free permits right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits the store was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the store, failing current and future acquisitions
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether the store has been closed
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
