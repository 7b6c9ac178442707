//! Queue errors.

use std::time::Duration;

use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A task with the same id is already pending or running in this queue.
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),

    /// A queue with this name is already registered.
    #[error("Duplicate queue name: {0}")]
    DuplicateQueueName(String),

    /// The queue's pending limit has been reached.
    #[error("Queue is full")]
    QueueFull,

    /// Task execution failed.
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// Task execution exceeded its deadline. The underlying work is no
    /// longer waited on, but may still be running.
    #[error("Task execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    /// Operation attempted on an executor after `destroy()`.
    #[error("Executor has been destroyed")]
    ExecutorDestroyed,

    /// Operation attempted on a destroyed queue, or the queue was destroyed
    /// while the task was still pending.
    #[error("Queue has been destroyed")]
    QueueDestroyed,
}
