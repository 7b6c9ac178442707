//! Queue and executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of tasks executing simultaneously.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whether pushing to a stopped queue implicitly starts processing.
    #[serde(default)]
    pub autostart: bool,

    /// Maximum number of pending tasks (0 = unlimited).
    #[serde(default)]
    pub max_pending: usize,

    /// Per-task execution deadline in milliseconds (0 = none).
    #[serde(default)]
    pub task_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            autostart: false,
            max_pending: 0,
            task_timeout_ms: 0,
        }
    }
}

impl QueueConfig {
    /// The per-task deadline, if one is configured.
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_ms > 0).then(|| Duration::from_millis(self.task_timeout_ms))
    }
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Default execution deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Whether to sample resource usage around each execution.
    #[serde(default)]
    pub enable_resource_monitoring: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            enable_resource_monitoring: false,
        }
    }
}

impl ExecutorConfig {
    /// The default execution deadline.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.concurrency, 1);
        assert!(!config.autostart);
        assert_eq!(config.max_pending, 0);
        assert_eq!(config.task_timeout(), None);
    }

    #[test]
    fn test_queue_config_partial_deserialize() {
        let config: QueueConfig = serde_json::from_str(r#"{"concurrency": 4}"#).unwrap();
        assert_eq!(config.concurrency, 4);
        assert!(!config.autostart);
        assert_eq!(config.task_timeout_ms, 0);
    }

    #[test]
    fn test_task_timeout_conversion() {
        let config = QueueConfig {
            task_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.task_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_executor_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert!(!config.enable_resource_monitoring);
    }
}
