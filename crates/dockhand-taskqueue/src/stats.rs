//! Statistics snapshots.

use serde::{Deserialize, Serialize};

/// Per-queue counters. Best-effort snapshot; not atomic across concurrent
/// mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total tasks accepted by `push`.
    pub pushed: u64,
    /// Tasks waiting for a slot.
    pub pending: u64,
    /// Tasks currently executing.
    pub running: u64,
    /// Tasks that completed successfully.
    pub completed: u64,
    /// Tasks that failed or timed out.
    pub failed: u64,
}

/// Executor-wide counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorStats {
    /// Total executions attempted.
    pub executions: u64,
    /// Executions that failed with the task's own error.
    pub failures: u64,
    /// Executions abandoned at the deadline.
    pub timeouts: u64,
    /// Mean wall-clock duration across all executions.
    pub average_duration_ms: f64,
}
