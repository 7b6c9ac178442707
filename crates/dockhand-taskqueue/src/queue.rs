//! Task queue engine with FIFO, priority, and delayed disciplines.

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::executor::run_with_timeout;
use crate::stats::QueueStats;
use crate::task::{Task, TaskHandle, TaskResult, TaskWork};

/// Dequeue-ordering policy, fixed at queue creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueDiscipline {
    /// Strict insertion order.
    Fifo,
    /// Highest priority first; ties broken by insertion order.
    Priority,
    /// Eligible `delay` after push; earliest eligibility first.
    Delayed,
}

/// A task accepted into a queue, waiting for a slot.
struct QueuedTask {
    seq: u64,
    id: String,
    priority: i32,
    eligible_at: Instant,
    work: TaskWork,
    completion: oneshot::Sender<TaskResult>,
}

/// Wrapper for priority-discipline heap ordering.
struct PriorityEntry(QueuedTask);

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.seq == other.0.seq
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier insertion
        match self.0.priority.cmp(&other.0.priority) {
            Ordering::Equal => other.0.seq.cmp(&self.0.seq),
            other => other,
        }
    }
}

/// Wrapper for delayed-discipline heap ordering.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
struct DelayedEntry(QueuedTask);

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.seq == other.0.seq
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.0.eligible_at.cmp(&self.0.eligible_at) {
            Ordering::Equal => other.0.seq.cmp(&self.0.seq),
            other => other,
        }
    }
}

/// Discipline-specific pending collection.
enum PendingStore {
    Fifo(VecDeque<QueuedTask>),
    Priority(BinaryHeap<PriorityEntry>),
    Delayed(BinaryHeap<DelayedEntry>),
}

impl PendingStore {
    fn new(discipline: QueueDiscipline) -> Self {
        match discipline {
            QueueDiscipline::Fifo => Self::Fifo(VecDeque::new()),
            QueueDiscipline::Priority => Self::Priority(BinaryHeap::new()),
            QueueDiscipline::Delayed => Self::Delayed(BinaryHeap::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo(q) => q.len(),
            Self::Priority(h) => h.len(),
            Self::Delayed(h) => h.len(),
        }
    }

    fn insert(&mut self, task: QueuedTask) {
        match self {
            Self::Fifo(q) => q.push_back(task),
            Self::Priority(h) => h.push(PriorityEntry(task)),
            Self::Delayed(h) => h.push(DelayedEntry(task)),
        }
    }

    /// Remove and return the next task that may run at `now`.
    fn pop_eligible(&mut self, now: Instant) -> Option<QueuedTask> {
        match self {
            Self::Fifo(q) => q.pop_front(),
            Self::Priority(h) => h.pop().map(|entry| entry.0),
            Self::Delayed(h) => {
                if h.peek().is_some_and(|entry| entry.0.eligible_at <= now) {
                    h.pop().map(|entry| entry.0)
                } else {
                    None
                }
            }
        }
    }

    /// Earliest instant at which a currently-ineligible task becomes
    /// eligible. Only the delayed discipline ever defers.
    fn next_eligible_at(&self) -> Option<Instant> {
        match self {
            Self::Delayed(h) => h.peek().map(|entry| entry.0.eligible_at),
            _ => None,
        }
    }

    fn drain(&mut self) -> Vec<QueuedTask> {
        match self {
            Self::Fifo(q) => q.drain(..).collect(),
            Self::Priority(h) => h.drain().map(|entry| entry.0).collect(),
            Self::Delayed(h) => h.drain().map(|entry| entry.0).collect(),
        }
    }
}

struct QueueState {
    pending: PendingStore,
    /// Ids currently pending or running; the duplicate-id check.
    ids: HashSet<String>,
    running: usize,
    started: bool,
    destroyed: bool,
    seq: u64,
    pushed: u64,
    completed: u64,
    failed: u64,
}

struct QueueInner {
    name: String,
    discipline: QueueDiscipline,
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Arc<Notify>,
}

enum Step {
    Spawned,
    Idle,
    Sleep(Instant),
    Exit,
}

impl QueueInner {
    /// One scheduler decision under the state lock. Never awaits.
    fn next_step(self: &Arc<Self>) -> Step {
        let mut state = self.state.lock();
        if state.destroyed {
            return Step::Exit;
        }
        if !state.started || state.running >= self.config.concurrency {
            return Step::Idle;
        }
        if let Some(task) = state.pending.pop_eligible(Instant::now()) {
            state.running += 1;
            drop(state);
            spawn_slot(Arc::clone(self), task);
            return Step::Spawned;
        }
        state.pending.next_eligible_at().map_or(Step::Idle, Step::Sleep)
    }
}

/// Run one queued task in its own slot and report the outcome.
fn spawn_slot(inner: Arc<QueueInner>, task: QueuedTask) {
    let timeout = inner.config.task_timeout();
    tokio::spawn(async move {
        let QueuedTask {
            id, work, completion, ..
        } = task;
        debug!("Queue {} running task {}", inner.name, id);

        // The work runs in its own task so a panic surfaces as a JoinError
        // instead of wedging the slot accounting below.
        let join = tokio::spawn(async move { run_with_timeout(timeout, work()).await });
        let result = match join.await {
            Ok(result) => result,
            Err(e) => Err(QueueError::ExecutionFailed(format!("task panicked: {e}"))),
        };

        let mut state = inner.state.lock();
        state.running -= 1;
        state.ids.remove(&id);
        match &result {
            Ok(_) => state.completed += 1,
            Err(_) => state.failed += 1,
        }
        drop(state);

        match &result {
            Ok(_) => debug!("Queue {} completed task {}", inner.name, id),
            Err(e) => error!("Queue {} task {} failed: {}", inner.name, id, e),
        }

        let _ = completion.send(result);
        inner.notify.notify_one();
    });
}

/// Scheduler loop, one per queue. Exits when the queue is destroyed or every
/// external handle to it is gone.
async fn scheduler_loop(inner: Weak<QueueInner>, notify: Arc<Notify>) {
    loop {
        let step = match inner.upgrade() {
            Some(inner) => inner.next_step(),
            None => break,
        };
        match step {
            Step::Spawned => continue,
            Step::Exit => break,
            Step::Idle => notify.notified().await,
            Step::Sleep(deadline) => {
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
        }
    }
}

/// A named task queue with a fixed discipline and bounded concurrency.
///
/// `push`, `start`, `stop`, and `stats` are synchronous: they update state
/// under a short critical section and return. Task work runs on the tokio
/// runtime the queue was created on.
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.inner.name)
            .field("discipline", &self.inner.discipline)
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    /// Create a new queue. Must be called within a tokio runtime.
    ///
    /// A `concurrency` of 0 is treated as 1.
    pub fn new(name: impl Into<String>, discipline: QueueDiscipline, config: QueueConfig) -> Self {
        let config = QueueConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        let notify = Arc::new(Notify::new());
        let inner = Arc::new(QueueInner {
            name: name.into(),
            discipline,
            config,
            state: Mutex::new(QueueState {
                pending: PendingStore::new(discipline),
                ids: HashSet::new(),
                running: 0,
                started: false,
                destroyed: false,
                seq: 0,
                pushed: 0,
                completed: 0,
                failed: 0,
            }),
            notify: Arc::clone(&notify),
        });
        tokio::spawn(scheduler_loop(Arc::downgrade(&inner), notify));
        debug!("Created {:?} queue {}", discipline, inner.name);
        Self { inner }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue discipline.
    pub fn discipline(&self) -> QueueDiscipline {
        self.inner.discipline
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Check if no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the queue is processing.
    pub fn is_started(&self) -> bool {
        self.inner.state.lock().started
    }

    /// Accept a task.
    ///
    /// Fails with [`QueueError::DuplicateTaskId`] if a task with the same id
    /// is already pending or running here, and with [`QueueError::QueueFull`]
    /// if `max_pending` is configured and reached. If `autostart` is set and
    /// the queue has not been started, processing begins.
    pub fn push(&self, task: Task) -> Result<TaskHandle, QueueError> {
        let Task {
            id,
            priority,
            delay,
            work,
            ..
        } = task;

        let mut state = self.inner.state.lock();
        if state.destroyed {
            return Err(QueueError::QueueDestroyed);
        }
        if state.ids.contains(&id) {
            return Err(QueueError::DuplicateTaskId(id));
        }
        if self.inner.config.max_pending > 0
            && state.pending.len() >= self.inner.config.max_pending
        {
            return Err(QueueError::QueueFull);
        }

        let eligible_at = match (self.inner.discipline, delay) {
            (QueueDiscipline::Delayed, Some(delay)) => Instant::now() + delay,
            _ => Instant::now(),
        };
        let seq = state.seq;
        state.seq += 1;
        state.pushed += 1;
        state.ids.insert(id.clone());

        let (tx, rx) = oneshot::channel();
        state.pending.insert(QueuedTask {
            seq,
            id: id.clone(),
            priority,
            eligible_at,
            work,
            completion: tx,
        });

        let autostarted = !state.started && self.inner.config.autostart;
        if autostarted {
            state.started = true;
        }
        drop(state);

        debug!("Queue {} accepted task {}", self.inner.name, id);
        if autostarted {
            info!("Queue {} autostarted", self.inner.name);
        }
        self.inner.notify.notify_one();
        Ok(TaskHandle::new(id, rx))
    }

    /// Begin processing. Idempotent.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.destroyed || state.started {
            return;
        }
        state.started = true;
        drop(state);
        info!("Queue {} started", self.inner.name);
        self.inner.notify.notify_one();
    }

    /// Stop dequeuing. In-flight tasks finish. Idempotent.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.started {
            return;
        }
        state.started = false;
        drop(state);
        info!("Queue {} stopped", self.inner.name);
        self.inner.notify.notify_one();
    }

    /// Best-effort counter snapshot.
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            pushed: state.pushed,
            pending: state.pending.len() as u64,
            running: state.running as u64,
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Tear the queue down: stop dequeuing and resolve every pending task's
    /// handle with [`QueueError::QueueDestroyed`]. In-flight tasks finish and
    /// still update statistics. Idempotent.
    pub fn destroy(&self) {
        let dropped = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.started = false;
            let dropped = state.pending.drain();
            for task in &dropped {
                state.ids.remove(&task.id);
            }
            dropped
        };
        let count = dropped.len();
        for task in dropped {
            let _ = task.completion.send(Err(QueueError::QueueDestroyed));
        }
        info!(
            "Queue {} destroyed, {} pending tasks dropped",
            self.inner.name, count
        );
        self.inner.notify.notify_one();
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.destroy();
    }
}
