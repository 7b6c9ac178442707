//! Named queue registry.

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::{QueueDiscipline, TaskQueue};
use crate::stats::QueueStats;

/// Registry mapping queue names to live queue instances.
///
/// Owned by the application's composition root; tests construct their own
/// isolated instances. The registry lock serializes create/destroy against
/// each other, never against individual queues' internals.
pub struct QueueFactory {
    queues: RwLock<HashMap<String, Arc<TaskQueue>>>,
}

impl QueueFactory {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a queue.
    ///
    /// Fails with [`QueueError::DuplicateQueueName`] if `name` is taken,
    /// leaving the registry unchanged.
    pub fn create_queue(
        &self,
        name: impl Into<String>,
        discipline: QueueDiscipline,
        config: QueueConfig,
    ) -> Result<Arc<TaskQueue>, QueueError> {
        let name = name.into();
        let mut queues = self.queues.write();
        if queues.contains_key(&name) {
            return Err(QueueError::DuplicateQueueName(name));
        }
        let queue = Arc::new(TaskQueue::new(name.clone(), discipline, config));
        queues.insert(name.clone(), Arc::clone(&queue));
        drop(queues);
        info!("Registered {:?} queue {}", discipline, name);
        Ok(queue)
    }

    /// Look up a queue by name.
    pub fn get_queue(&self, name: &str) -> Option<Arc<TaskQueue>> {
        self.queues.read().get(name).cloned()
    }

    /// Stop and unregister a queue. No-op if the name is absent. In-flight
    /// tasks are allowed to finish.
    pub fn destroy_queue(&self, name: &str) {
        let removed = self.queues.write().remove(name);
        if let Some(queue) = removed {
            queue.destroy();
            info!("Destroyed queue {}", name);
        }
    }

    /// Destroy every registered queue.
    pub fn destroy_all_queues(&self) {
        let drained: Vec<_> = self.queues.write().drain().collect();
        for (name, queue) in drained {
            queue.destroy();
            debug!("Destroyed queue {}", name);
        }
    }

    /// Statistics snapshot for every registered queue.
    pub fn global_stats(&self) -> HashMap<String, QueueStats> {
        self.queues
            .read()
            .iter()
            .map(|(name, queue)| (name.clone(), queue.stats()))
            .collect()
    }

    /// Number of registered queues.
    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }
}

impl Default for QueueFactory {
    fn default() -> Self {
        Self::new()
    }
}
