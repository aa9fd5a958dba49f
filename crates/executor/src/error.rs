//! Executor errors

use thiserror::Error;

/// Result type alias for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Why a submission was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The pool is shutting down or has terminated
    Shutdown,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => write!(f, "executor is shut down"),
        }
    }
}

/// Executor errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Invalid configuration
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),

    /// Constructed outside a tokio runtime
    #[error("executor must be created inside a tokio runtime")]
    NoRuntime,

    /// Submission rejected; any permit it took has been returned
    #[error("task rejected: {0}")]
    Rejected(RejectReason),
}
