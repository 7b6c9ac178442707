//! End-to-end scenarios for named queues, the executor, and the registry.
//!
//! These tests drive the crate the way a plugin host would: queues come from
//! the factory, work is awaited through completion handles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use dockhand_taskqueue::{
    ExecutorConfig, QueueConfig, QueueDiscipline, QueueError, QueueFactory, Task, TaskExecutor,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// A task that records its id into `log` when it runs.
fn record_task(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Task {
    let log = Arc::clone(log);
    let task_id = id.to_string();
    Task::new(id, move || async move {
        log.lock().unwrap().push(task_id);
        Ok(json!(null))
    })
}

// ============================================================================
// Queue scenarios
// ============================================================================

#[tokio::test]
async fn test_fifo_queue_processes_in_push_order() {
    let factory = QueueFactory::new();
    let queue = factory
        .create_queue("sequential", QueueDiscipline::Fifo, QueueConfig::default())
        .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let a = queue.push(record_task("A", &log)).unwrap();
    let b = queue.push(record_task("B", &log)).unwrap();
    let c = queue.push(record_task("C", &log)).unwrap();
    queue.start();

    a.wait().await.unwrap();
    b.wait().await.unwrap();
    c.wait().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    let stats = queue.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn test_priority_queue_serves_highest_first() {
    let factory = QueueFactory::new();
    let queue = factory
        .create_queue("ranked", QueueDiscipline::Priority, QueueConfig::default())
        .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let low = queue.push(record_task("low", &log).with_priority(1)).unwrap();
    let high = queue
        .push(record_task("high", &log).with_priority(10))
        .unwrap();
    let medium = queue
        .push(record_task("medium", &log).with_priority(5))
        .unwrap();
    queue.start();

    low.wait().await.unwrap();
    high.wait().await.unwrap();
    medium.wait().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["high", "medium", "low"]);
}

#[tokio::test]
async fn test_delayed_queue_runs_immediate_task_first() {
    let factory = QueueFactory::new();
    let queue = factory
        .create_queue(
            "timers",
            QueueDiscipline::Delayed,
            QueueConfig {
                autostart: true,
                ..Default::default()
            },
        )
        .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let deferred = queue
        .push(record_task("deferred", &log).with_delay(Duration::from_millis(500)))
        .unwrap();
    let immediate = queue.push(record_task("immediate", &log)).unwrap();

    immediate.wait().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["immediate"]);

    deferred.wait().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["immediate", "deferred"]);
}

// ============================================================================
// Registry lifecycle
// ============================================================================

#[tokio::test]
async fn test_registry_teardown() {
    let factory = QueueFactory::new();
    let busy = factory
        .create_queue(
            "busy",
            QueueDiscipline::Fifo,
            QueueConfig {
                autostart: true,
                ..Default::default()
            },
        )
        .unwrap();
    factory
        .create_queue("idle", QueueDiscipline::Fifo, QueueConfig::default())
        .unwrap();

    let in_flight = busy
        .push(Task::new("in-flight", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!("survived"))
        }))
        .unwrap();
    // Give the task time to reach its slot.
    tokio::time::sleep(Duration::from_millis(10)).await;

    factory.destroy_queue("busy");

    // The destroyed queue disappears from aggregate stats immediately...
    let stats = factory.global_stats();
    assert!(!stats.contains_key("busy"));
    assert!(stats.contains_key("idle"));

    // ...but its in-flight task is allowed to finish.
    assert_eq!(in_flight.wait().await.unwrap(), json!("survived"));

    factory.destroy_all_queues();
    assert!(factory.is_empty());
}

// ============================================================================
// Executor
// ============================================================================

#[tokio::test]
async fn test_executor_reports_usage_and_distinguishes_timeout() {
    let executor = TaskExecutor::new(ExecutorConfig {
        default_timeout_ms: 100,
        enable_resource_monitoring: true,
    });

    let report = executor
        .execute(Task::new("quick", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!({"status": "ok"}))
        }))
        .await
        .unwrap();
    assert_eq!(report.output["status"], "ok");
    let usage = report.usage.expect("monitoring enabled");
    assert!(usage.duration_ms >= 10);

    // A genuine failure and a timeout surface as different errors.
    let failure = executor
        .execute(Task::new("broken", || async {
            Err(QueueError::ExecutionFailed("bad input".to_string()))
        }))
        .await
        .unwrap_err();
    assert!(matches!(failure, QueueError::ExecutionFailed(_)));

    let timeout = executor
        .execute(Task::new("hung", || async {
            std::future::pending::<()>().await;
            Ok(json!(null))
        }))
        .await
        .unwrap_err();
    assert!(matches!(timeout, QueueError::ExecutionTimeout(_)));

    let stats = executor.stats();
    assert_eq!(stats.executions, 3);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.timeouts, 1);

    executor.destroy();
    let rejected = executor
        .execute(Task::new("late", || async { Ok(json!(null)) }))
        .await
        .unwrap_err();
    assert!(matches!(rejected, QueueError::ExecutorDestroyed));
}
