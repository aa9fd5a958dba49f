//! Sizing policy for the adaptive executor
//!
//! Additive increase / additive decrease over the effective pool size,
//! driven only by whether each finished task was fast or slow.
//!
//! ```text
//!            fast, below max                  slow, above 1
//!   size ────────────────────► size + 1    size ───────────► size - 1
//!   (task permit + 1 extra returned)        (task permit kept)
//!
//!   fast at max:  size unchanged, task permit returned
//!   slow at 1:    size unchanged, task permit returned
//! ```

use std::time::Duration;

use serde::Serialize;

/// Latency class of a finished task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Latency {
    /// Finished below the threshold
    Fast,
    /// Finished at or above the threshold
    Slow,
}

impl Latency {
    /// Classify a task duration against an optional threshold
    ///
    /// Without a threshold every task is fast.
    pub fn classify(elapsed: Duration, threshold: Option<Duration>) -> Self {
        match threshold {
            Some(threshold) if elapsed >= threshold => Self::Slow,
            _ => Self::Fast,
        }
    }
}

/// What the controller does after one task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SizingDecision {
    /// Fast task at the ceiling: return the task's permit
    Release,
    /// Fast task below the ceiling: return the task's permit and one more
    Grow { to: usize },
    /// Slow task on the last slot: return the permit so the pool cannot starve
    HoldAtFloor,
    /// Slow task: keep the task's permit
    Shrink { to: usize },
}

impl SizingDecision {
    /// Decide from the current size, the ceiling and the task's latency
    pub fn decide(current: usize, max: usize, latency: Latency) -> Self {
        match latency {
            Latency::Fast if current < max => Self::Grow { to: current + 1 },
            Latency::Fast => Self::Release,
            Latency::Slow if current <= 1 => Self::HoldAtFloor,
            Latency::Slow => Self::Shrink { to: current - 1 },
        }
    }

    /// Effective size after applying this decision
    pub fn next_size(&self, current: usize) -> usize {
        match *self {
            Self::Grow { to } | Self::Shrink { to } => to,
            Self::Release | Self::HoldAtFloor => current,
        }
    }

    /// Permits this decision hands back to the store
    pub fn permits_returned(&self) -> usize {
        match self {
            Self::Grow { .. } => 2,
            Self::Release | Self::HoldAtFloor => 1,
            Self::Shrink { .. } => 0,
        }
    }
}

/// Idle keep-alive for a given threshold: twice the threshold
///
/// `None` (workers are never reclaimed) when the threshold is disabled.
pub fn keep_alive_for(threshold: Option<Duration>) -> Option<Duration> {
    threshold.map(|t| t.saturating_mul(2))
}
