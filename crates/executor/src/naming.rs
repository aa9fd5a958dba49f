//! Worker identities

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static POOL_NUMBER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of one pool worker
///
/// Workers keep their identity for their whole lifetime, across every task
/// they run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pool: u64,
    seq: u64,
    name: String,
}

impl WorkerId {
    /// Human-readable name, e.g. `executor-1-worker-3`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-wide pool number
    pub fn pool(&self) -> u64 {
        self.pool
    }

    /// Worker number within its pool, starting at 1
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Hands out unique worker identities for one pool
#[derive(Debug)]
pub struct WorkerNamer {
    prefix: String,
    pool: u64,
    next: AtomicU64,
}

impl WorkerNamer {
    /// Create a namer, claiming the next process-wide pool number
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            pool: POOL_NUMBER.fetch_add(1, Ordering::Relaxed),
            next: AtomicU64::new(1),
        }
    }

    /// Next worker identity
    pub fn next_id(&self) -> WorkerId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        WorkerId {
            pool: self.pool,
            seq,
            name: format!("{}-{}-worker-{}", self.prefix, self.pool, seq),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_names_are_sequential() {
        let namer = WorkerNamer::new("indexer");
        let first = namer.next_id();
        let second = namer.next_id();

        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 2);
        assert_eq!(first.name(), format!("indexer-{}-worker-1", namer.pool));
        assert_eq!(second.to_string(), format!("indexer-{}-worker-2", namer.pool));
        assert_ne!(first, second);
    }

    #[test]
    fn test_pools_get_distinct_numbers() {
        let a = WorkerNamer::new("same");
        let b = WorkerNamer::new("same");
        assert_ne!(a.next_id().pool(), b.next_id().pool());
    }
}
