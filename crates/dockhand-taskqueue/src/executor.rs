//! Standalone task executor with timeout and resource monitoring.

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::ExecutorConfig;
use crate::error::QueueError;
use crate::stats::ExecutorStats;
use crate::task::{Task, TaskFuture, TaskResult};

/// Await `future`, abandoning it at the deadline if one is given.
///
/// Shared by the executor and queue execution slots. An abandoned future is
/// dropped, not cancelled: work it already spawned may keep running.
pub(crate) async fn run_with_timeout(timeout: Option<Duration>, future: TaskFuture) -> TaskResult {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::ExecutionTimeout(limit)),
        },
        None => future.await,
    }
}

/// Wall-clock measurements sampled around one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Sampled immediately before execution.
    pub started_at: DateTime<Utc>,
    /// Sampled immediately after execution.
    pub finished_at: DateTime<Utc>,
}

/// Result of a successful [`TaskExecutor::execute`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Id of the executed task.
    pub task_id: String,
    /// The task's output value.
    pub output: serde_json::Value,
    /// Measurements, when resource monitoring is enabled.
    pub usage: Option<ResourceUsage>,
}

/// Executes single tasks outside of any queue's concurrency accounting.
///
/// Adds two independent concerns around the task's work: a deadline
/// (`default_timeout_ms`, or a per-call override) and optional resource
/// sampling attached to the report.
pub struct TaskExecutor {
    config: ExecutorConfig,
    destroyed: AtomicBool,
    executions: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    total_duration_us: AtomicU64,
}

impl TaskExecutor {
    /// Create a new executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            destroyed: AtomicBool::new(false),
            executions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
        }
    }

    /// Set the default deadline.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Execute one task under the default deadline.
    pub async fn execute(&self, task: Task) -> Result<ExecutionReport, QueueError> {
        let timeout = self.config.default_timeout();
        self.run(task, timeout).await
    }

    /// Execute one task under a per-call deadline.
    pub async fn execute_with_timeout(
        &self,
        task: Task,
        timeout: Duration,
    ) -> Result<ExecutionReport, QueueError> {
        self.run(task, timeout).await
    }

    async fn run(&self, task: Task, timeout: Duration) -> Result<ExecutionReport, QueueError> {
        if self.is_destroyed() {
            error!("Execute called on destroyed executor for task {}", task.id);
            return Err(QueueError::ExecutorDestroyed);
        }

        let Task { id, work, .. } = task;
        let started_at = Utc::now();
        let start = Instant::now();

        let result = run_with_timeout(Some(timeout), work()).await;

        let elapsed = start.elapsed();
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.total_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::SeqCst);

        match result {
            Ok(output) => {
                debug!("Executor completed task {} in {:?}", id, elapsed);
                let usage = self
                    .config
                    .enable_resource_monitoring
                    .then(|| ResourceUsage {
                        duration_ms: elapsed.as_millis() as u64,
                        started_at,
                        finished_at: Utc::now(),
                    });
                Ok(ExecutionReport {
                    task_id: id,
                    output,
                    usage,
                })
            }
            Err(QueueError::ExecutionTimeout(limit)) => {
                self.timeouts.fetch_add(1, Ordering::SeqCst);
                warn!("Executor abandoned task {} after {:?}", id, limit);
                Err(QueueError::ExecutionTimeout(limit))
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                error!("Executor task {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    /// Aggregate counters.
    pub fn stats(&self) -> ExecutorStats {
        let executions = self.executions.load(Ordering::SeqCst);
        let total_us = self.total_duration_us.load(Ordering::SeqCst);
        let average_duration_ms = if executions > 0 {
            (total_us as f64 / executions as f64) / 1_000.0
        } else {
            0.0
        };
        ExecutorStats {
            executions,
            failures: self.failures.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
            average_duration_ms,
        }
    }

    /// Permanently disable the executor. Subsequent `execute` calls fail
    /// with [`QueueError::ExecutorDestroyed`].
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        debug!("Task executor destroyed");
    }

    /// Check if the executor has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}
