use std::sync::Arc;
use std::time::Duration;

use orchestrator_broker::{keys, Broker};
use orchestrator_core::{now_ms, ErrorClass, Task};
use orchestrator_txlog::TransactionEvent;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RetryError;

/// A task that exhausted its retry budget (or hit a non-recoverable error
/// class on first failure). Stored in `dlq:failed_tasks`, a sorted set
/// scored by the ms timestamp it expires at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub task: Task,
    pub error_class: ErrorClass,
    pub error_message: String,
    pub attempts: u32,
    pub dead_lettered_at_ms: u64,
    pub reason: String,
}

pub struct DeadLetterQueue {
    broker: Arc<dyn Broker>,
    ttl: Duration,
}

impl DeadLetterQueue {
    pub fn new(broker: Arc<dyn Broker>, ttl: Duration) -> Self {
        Self { broker, ttl }
    }

    pub async fn archive(
        &self,
        agent: &str,
        task: Task,
        error_class: ErrorClass,
        error_message: String,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Result<(), RetryError> {
        let reason = reason.into();
        let record = DeadLetterRecord {
            task,
            error_class,
            error_message,
            attempts,
            dead_lettered_at_ms: now_ms(),
            reason: reason.clone(),
        };
        let expires_at = now_ms() + self.ttl.as_millis() as u64;
        let payload = serde_json::to_string(&record)?;
        self.broker
            .hset(&format!("{}:payload", keys::DLQ_FAILED_TASKS), &record.task.id, payload)
            .await?;
        self.broker.zadd(keys::DLQ_FAILED_TASKS, &record.task.id, expires_at as f64).await?;

        let channel = format!("dlq:{agent}:archive");
        let mut event = TransactionEvent::new(&channel, "archive", record.dead_lettered_at_ms);
        event.task_id = Some(record.task.id.clone());
        event.task_type = record.task.task_type.clone();
        event.agent_id = Some(agent.to_string());
        event.outcome = Some(reason);
        if let Ok(payload) = serde_json::to_string(&event) {
            if let Err(err) = self.broker.publish(&channel, payload).await {
                warn!(task_id = %record.task.id, error = %err, "failed to publish dead-letter archive event");
            }
        }
        Ok(())
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<DeadLetterRecord>, RetryError> {
        let payload = self.broker.hget(&format!("{}:payload", keys::DLQ_FAILED_TASKS), task_id).await?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    /// Removes the task from the dead-letter queue, returning its record so
    /// the caller (the retry engine's `ForceRetry` handler) can reschedule
    /// it. Errors if the task was never dead-lettered or has already
    /// expired out of the queue.
    pub async fn remove(&self, task_id: &str) -> Result<DeadLetterRecord, RetryError> {
        let record = self
            .get(task_id)
            .await?
            .ok_or_else(|| RetryError::NotInDeadLetterQueue(task_id.to_string()))?;
        self.broker.zrem(keys::DLQ_FAILED_TASKS, task_id).await?;
        self.broker.hdel(&format!("{}:payload", keys::DLQ_FAILED_TASKS), task_id).await?;
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<DeadLetterRecord>, RetryError> {
        let ids = self.broker.zrange(keys::DLQ_FAILED_TASKS, 0, -1).await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(&id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Drops any dead-letter entries past their TTL. Run on a 5-minute
    /// cycle by [`crate::engine::RetryEngine::run`].
    pub async fn purge_expired(&self) -> Result<u64, RetryError> {
        let now = now_ms() as f64;
        let expired = self.broker.zrangebyscore(keys::DLQ_FAILED_TASKS, 0.0, now).await?;
        let mut purged = 0;
        for id in expired {
            self.broker.zrem(keys::DLQ_FAILED_TASKS, &id).await?;
            self.broker.hdel(&format!("{}:payload", keys::DLQ_FAILED_TASKS), &id).await?;
            purged += 1;
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;
    use orchestrator_core::Priority;

    fn task(id: &str) -> Task {
        Task::new(Some(id.to_string()), None, "do a thing".into(), Priority::Normal, 3).unwrap()
    }

    #[tokio::test]
    async fn archive_then_remove_round_trips() {
        let dlq = DeadLetterQueue::new(Arc::new(InMemoryBroker::new()), Duration::from_secs(3600));
        dlq.archive("claude-1", task("t1"), ErrorClass::ParseError, "bad json".into(), 2, "max_retries_exceeded")
            .await
            .unwrap();
        assert!(dlq.get("t1").await.unwrap().is_some());
        let removed = dlq.remove("t1").await.unwrap();
        assert_eq!(removed.task.id, "t1");
        assert!(dlq.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_missing_task_errors() {
        let dlq = DeadLetterQueue::new(Arc::new(InMemoryBroker::new()), Duration::from_secs(3600));
        assert!(dlq.remove("ghost").await.is_err());
    }
}
