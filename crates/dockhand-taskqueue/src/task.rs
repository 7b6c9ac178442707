//! Task definition and completion handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::error::QueueError;

/// Result of a task's work: an opaque JSON value, or the task's own error.
pub type TaskResult = Result<serde_json::Value, QueueError>;

/// Boxed future produced by a task's work closure.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

pub(crate) type TaskWork = Box<dyn FnOnce() -> TaskFuture + Send>;

/// A unit of schedulable work.
///
/// Immutable once pushed; the work closure is consumed exactly once.
pub struct Task {
    /// Caller-assigned id, unique per queue (not globally).
    pub id: String,
    /// Higher value is served earlier (Priority discipline only).
    pub priority: i32,
    /// Eligibility delay (Delayed discipline only).
    pub delay: Option<Duration>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    pub(crate) work: TaskWork,
}

impl Task {
    /// Create a new task around a zero-argument asynchronous closure.
    pub fn new<F, Fut>(id: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            id: id.into(),
            priority: 0,
            delay: None,
            created_at: Utc::now(),
            work: Box::new(move || Box::pin(work())),
        }
    }

    /// Set task priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the eligibility delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("delay", &self.delay)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Completion handle returned by `push`.
///
/// Resolves at most once, with either the task's result or
/// [`QueueError::QueueDestroyed`] if the queue was torn down first. Dropping
/// the handle is allowed; the task still runs.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: String,
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: String, rx: oneshot::Receiver<TaskResult>) -> Self {
        Self { task_id, rx }
    }

    /// Id of the task this handle tracks.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Wait for the task to finish.
    pub async fn wait(self) -> TaskResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(QueueError::QueueDestroyed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("test", || async { Ok(serde_json::json!(null)) });
        assert_eq!(task.id, "test");
        assert_eq!(task.priority, 0);
        assert_eq!(task.delay, None);
    }

    #[test]
    fn test_task_builders() {
        let task = Task::new("test", || async { Ok(serde_json::json!(null)) })
            .with_priority(7)
            .with_delay(Duration::from_millis(100));
        assert_eq!(task.priority, 7);
        assert_eq!(task.delay, Some(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_work_produces_result() {
        let task = Task::new("test", || async { Ok(serde_json::json!({"n": 1})) });
        let result = (task.work)().await.unwrap();
        assert_eq!(result["n"], 1);
    }
}
