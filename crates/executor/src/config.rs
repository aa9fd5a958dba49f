//! Executor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

/// Executor configuration
///
/// Shared by [`BoundedExecutor`](crate::BoundedExecutor) and
/// [`AdaptiveExecutor`](crate::AdaptiveExecutor). The bounded pool ignores
/// `task_timeout`.
///
/// # Example
///
/// ```
/// use autoscale_executor::ExecutorConfig;
/// use std::time::Duration;
///
/// let config = ExecutorConfig::new(8)
///     .with_task_timeout(Duration::from_millis(250))
///     .with_name_prefix("thumbnailer");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of outstanding tasks (running + queued), and the
    /// ceiling for the effective pool size
    pub pool_size: usize,

    /// Tasks finishing at or above this duration count as slow.
    /// Zero disables the threshold: every task counts as fast.
    #[serde(with = "duration_millis")]
    pub task_timeout: Duration,

    /// How often `drain_and_shutdown` checks for remaining work
    #[serde(with = "duration_millis")]
    pub drain_poll_interval: Duration,

    /// How long running tasks get to finish once shutdown starts
    #[serde(with = "duration_millis")]
    pub shutdown_grace: Duration,

    /// Prefix for worker names
    pub name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            task_timeout: Duration::ZERO,
            drain_poll_interval: Duration::from_millis(200),
            shutdown_grace: Duration::from_secs(5),
            name_prefix: "executor".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration with the given pool size
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pool_size = env_parse("EXECUTOR_POOL_SIZE").unwrap_or(defaults.pool_size);
        let task_timeout = env_parse("EXECUTOR_TASK_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.task_timeout);
        let drain_poll_interval = env_parse("EXECUTOR_DRAIN_POLL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.drain_poll_interval);
        let shutdown_grace = env_parse("EXECUTOR_SHUTDOWN_GRACE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.shutdown_grace);
        let name_prefix =
            std::env::var("EXECUTOR_NAME_PREFIX").unwrap_or(defaults.name_prefix);

        Self {
            pool_size,
            task_timeout,
            drain_poll_interval,
            shutdown_grace,
            name_prefix,
        }
    }

    /// Set the pool size
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the slow-task threshold
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the threshold from signed milliseconds; non-positive disables it
    pub fn with_task_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.task_timeout = u64::try_from(timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);
        self
    }

    /// Set the drain poll interval
    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the worker name prefix
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// The slow-task threshold, or `None` when disabled
    pub fn threshold(&self) -> Option<Duration> {
        (!self.task_timeout.is_zero()).then_some(self.task_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.pool_size == 0 {
            return Err(ExecutorError::InvalidConfig(
                "pool_size must be greater than zero".into(),
            ));
        }
        if self.drain_poll_interval.is_zero() {
            return Err(ExecutorError::InvalidConfig(
                "drain_poll_interval must be greater than zero".into(),
            ));
        }
        if self.name_prefix.is_empty() {
            return Err(ExecutorError::InvalidConfig(
                "name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.task_timeout, Duration::ZERO);
        assert_eq!(config.drain_poll_interval, Duration::from_millis(200));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.name_prefix, "executor");
    }

    #[test]
    fn test_config_builder() {
        let config = ExecutorConfig::new(3)
            .with_task_timeout(Duration::from_millis(100))
            .with_drain_poll_interval(Duration::from_millis(50))
            .with_shutdown_grace(Duration::from_secs(1))
            .with_name_prefix("crawler");

        assert_eq!(config.pool_size, 3);
        assert_eq!(config.task_timeout, Duration::from_millis(100));
        assert_eq!(config.drain_poll_interval, Duration::from_millis(50));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.name_prefix, "crawler");
    }

    #[test]
    fn test_non_positive_timeout_disables_threshold() {
        assert_eq!(ExecutorConfig::new(1).with_task_timeout_ms(0).threshold(), None);
        assert_eq!(ExecutorConfig::new(1).with_task_timeout_ms(-5).threshold(), None);
        assert_eq!(
            ExecutorConfig::new(1).with_task_timeout_ms(100).threshold(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(ExecutorConfig::new(1).validate().is_ok());
        assert!(ExecutorConfig::new(0).validate().is_err());
        assert!(ExecutorConfig::new(1)
            .with_drain_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ExecutorConfig::new(1).with_name_prefix("").validate().is_err());
    }

    #[test]
    fn test_serialization() {
        let config = ExecutorConfig::new(2).with_task_timeout(Duration::from_millis(750));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["task_timeout"], 750);
        assert_eq!(json["shutdown_grace"], 5000);

        let parsed: ExecutorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config, parsed);
    }
}
