//! Ready/in-flight list primitives.
//!
//! The ready queue for an agent is five plain Redis lists, one per
//! priority class (`queue:{agent}:p:{0..4}`), never a single sorted set:
//! `Broker::brpoplpush` — the atomic ready→in-flight ownership transfer —
//! only operates on lists, so priority ordering is achieved structurally
//! by scanning the per-class lists highest-first rather than by score
//! within one list. FIFO within a class falls out of list order (`rpush`
//! on enqueue, pop from the tail); `orchestrator-retry`'s re-enqueue
//! boosts a retried task by pushing it to the head instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_broker::{keys, Broker};
use orchestrator_core::{Priority, Task};
use tracing::{info, warn};

use crate::error::RuntimeError;
use crate::events;
use crate::task_store::{TaskStatus, TaskStore};

/// Priority classes in dispatch order, highest first.
pub const PRIORITY_CLASSES_DESC: [Priority; 5] =
    [Priority::Critical, Priority::High, Priority::Normal, Priority::Low, Priority::Deferred];

/// How long a single `brpoplpush` call blocks waiting on one priority
/// class's list before the dequeue loop moves on to poll the next.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

pub struct QueueFabric {
    broker: Arc<dyn Broker>,
    store: TaskStore,
}

impl QueueFabric {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { store: TaskStore::new(broker.clone()), broker }
    }

    /// Pushes `task` onto `agent`'s ready list for its current priority
    /// and records its durable status. A task is owned by exactly one
    /// queue at any instant; callers must not enqueue a task that is
    /// already live elsewhere (in-flight, retry schedule, DLQ).
    pub async fn enqueue(&self, task: &Task, agent: &str) -> Result<(), RuntimeError> {
        self.store.put(task, TaskStatus::Queued, Some(agent)).await?;
        let queue_key = keys::ready_queue(agent, task.priority.class());
        self.broker.rpush(&queue_key, task.id.clone()).await?;
        events::publish(&self.broker, format!("queue:{agent}:enqueue"), "enqueue", task, agent, None).await;
        Ok(())
    }

    /// Atomically moves one ready task into `agent`'s in-flight list,
    /// polling priority classes highest-first, and returns the full task
    /// body. Polls in a loop bounded by `overall_timeout`; returns `None`
    /// once that deadline passes with nothing to do.
    pub async fn dequeue_one(&self, agent: &str, overall_timeout: Duration) -> Result<Option<Task>, RuntimeError> {
        let deadline = Instant::now() + overall_timeout;
        let destination = keys::in_flight(agent);
        loop {
            for priority in PRIORITY_CLASSES_DESC {
                let source = keys::ready_queue(agent, priority.class());
                if let Some(task_id) = self.broker.brpoplpush(&source, &destination, POLL_TIMEOUT).await? {
                    let task = self.store.load_task(&task_id).await?;
                    self.store.set_status(&task_id, TaskStatus::InFlight).await?;
                    events::publish(&self.broker, format!("queue:{agent}:dequeue"), "dequeue", &task, agent, None).await;
                    return Ok(Some(task));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// Removes `task_id` from `agent`'s in-flight list. Called once the
    /// task cycle's terminal outcome (completion, dead-letter, or retry
    /// hand-off) has been recorded elsewhere, so the task is never
    /// visible in two queues at once.
    pub async fn release_in_flight(&self, agent: &str, task_id: &str) -> Result<(), RuntimeError> {
        self.broker.lrem(&keys::in_flight(agent), 1, task_id).await?;
        Ok(())
    }

    /// Re-queues a task that did not complete onto the ready list it came
    /// from, used both for startup orphan recovery and for a graceful
    /// shutdown that cannot finish an in-flight task within its deadline.
    pub async fn requeue(&self, task: &Task, agent: &str) -> Result<(), RuntimeError> {
        let queue_key = keys::ready_queue(agent, task.priority.class());
        self.broker.rpush(&queue_key, task.id.clone()).await?;
        self.store.set_status(&task.id, TaskStatus::Queued).await?;
        Ok(())
    }

    /// On agent startup, any residual entries in `in_flight:{agent}` are
    /// leftovers from a crash mid-cycle; move them back onto their ready
    /// list rather than losing them, restoring the exactly-once delivery
    /// invariant across process restarts.
    pub async fn recover_orphans(&self, agent: &str) -> Result<usize, RuntimeError> {
        let orphans = self.broker.lrange(&keys::in_flight(agent), 0, -1).await?;
        let mut recovered = 0;
        for task_id in orphans {
            let task = match self.store.load_task(&task_id).await {
                Ok(task) => task,
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "orphaned in-flight entry has no task record, dropping");
                    self.broker.lrem(&keys::in_flight(agent), 1, &task_id).await?;
                    continue;
                }
            };
            self.broker.lrem(&keys::in_flight(agent), 1, &task_id).await?;
            self.requeue(&task, agent).await?;
            recovered += 1;
        }
        if recovered > 0 {
            info!(agent, recovered, "recovered orphaned in-flight tasks on startup");
        }
        Ok(recovered)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;
    use orchestrator_core::Priority;

    fn task(id: &str, priority: Priority) -> Task {
        Task::new(Some(id.to_string()), None, "do a thing".into(), priority, 2).unwrap()
    }

    #[tokio::test]
    async fn dequeue_prefers_higher_priority_class() {
        let broker = Arc::new(InMemoryBroker::new());
        let fabric = QueueFabric::new(broker.clone());
        fabric.enqueue(&task("low1", Priority::Low), "a1").await.unwrap();
        fabric.enqueue(&task("crit1", Priority::Critical), "a1").await.unwrap();

        let dequeued = fabric.dequeue_one("a1", Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(dequeued.id, "crit1");
        assert_eq!(broker.llen(&keys::in_flight("a1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fifo_within_same_priority_class() {
        let broker = Arc::new(InMemoryBroker::new());
        let fabric = QueueFabric::new(broker.clone());
        fabric.enqueue(&task("first", Priority::Normal), "a1").await.unwrap();
        fabric.enqueue(&task("second", Priority::Normal), "a1").await.unwrap();

        let first = fabric.dequeue_one("a1", Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(first.id, "first");
    }

    #[tokio::test]
    async fn empty_queues_return_none_after_deadline() {
        let fabric = QueueFabric::new(Arc::new(InMemoryBroker::new()));
        let result = fabric.dequeue_one("a1", Duration::from_millis(120)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn release_removes_from_in_flight() {
        let broker = Arc::new(InMemoryBroker::new());
        let fabric = QueueFabric::new(broker.clone());
        fabric.enqueue(&task("t1", Priority::Normal), "a1").await.unwrap();
        fabric.dequeue_one("a1", Duration::from_millis(200)).await.unwrap();
        fabric.release_in_flight("a1", "t1").await.unwrap();
        assert_eq!(broker.llen(&keys::in_flight("a1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn startup_recovers_orphaned_in_flight_entries() {
        let broker = Arc::new(InMemoryBroker::new());
        let fabric = QueueFabric::new(broker.clone());
        fabric.enqueue(&task("orphan", Priority::High), "a1").await.unwrap();
        fabric.dequeue_one("a1", Duration::from_millis(200)).await.unwrap();
        // Simulate a crash: the task is stuck in in_flight with nothing running.
        assert_eq!(broker.llen(&keys::in_flight("a1")).await.unwrap(), 1);

        let recovered = fabric.recover_orphans("a1").await.unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(broker.llen(&keys::in_flight("a1")).await.unwrap(), 0);
        assert_eq!(broker.llen(&keys::ready_queue("a1", Priority::High.class())).await.unwrap(), 1);
    }
}
