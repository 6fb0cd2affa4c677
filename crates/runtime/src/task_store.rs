//! Durable task lookup: a `task:{id}` hash holding the current task
//! payload, a lifecycle status, and the agent last (or currently)
//! assigned to it. This is the only place `getTaskInfo`-style queries
//! (the admin surface, the runtime itself) need to read from, since the
//! queue fabric only ever carries ids, not full task bodies.

use orchestrator_broker::{keys, Broker};
use orchestrator_core::Task;
use std::sync::Arc;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    InFlight,
    RetryScheduled,
    DeadLettered,
    Completed,
    Failed,
}

impl TaskStatus {
    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InFlight => "in_flight",
            TaskStatus::RetryScheduled => "retry_scheduled",
            TaskStatus::DeadLettered => "dead_lettered",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A snapshot of everything `task:{id}` knows, for the admin surface's
/// task-info lookup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskInfo {
    pub task: Task,
    pub status: String,
    pub agent_id: Option<String>,
    pub updated_at_ms: u64,
}

pub struct TaskStore {
    broker: Arc<dyn Broker>,
}

impl TaskStore {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub async fn put(&self, task: &Task, status: TaskStatus, agent_id: Option<&str>) -> Result<(), RuntimeError> {
        let key = keys::task_info(&task.id);
        let payload = serde_json::to_string(task)?;
        self.broker.hset(&key, "payload", payload).await?;
        self.broker.hset(&key, "status", status.as_str().to_string()).await?;
        self.broker.hset(&key, "updated_at_ms", orchestrator_core::now_ms().to_string()).await?;
        if let Some(agent_id) = agent_id {
            self.broker.hset(&key, "agent_id", agent_id.to_string()).await?;
        }
        Ok(())
    }

    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), RuntimeError> {
        let key = keys::task_info(task_id);
        self.broker.hset(&key, "status", status.as_str().to_string()).await?;
        self.broker.hset(&key, "updated_at_ms", orchestrator_core::now_ms().to_string()).await?;
        Ok(())
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TaskInfo>, RuntimeError> {
        let key = keys::task_info(task_id);
        let fields = self.broker.hgetall(&key).await?;
        let Some(payload) = fields.get("payload") else { return Ok(None) };
        let task: Task = serde_json::from_str(payload)?;
        Ok(Some(TaskInfo {
            task,
            status: fields.get("status").cloned().unwrap_or_else(|| "unknown".to_string()),
            agent_id: fields.get("agent_id").cloned(),
            updated_at_ms: fields.get("updated_at_ms").and_then(|v| v.parse().ok()).unwrap_or(0),
        }))
    }

    pub async fn load_task(&self, task_id: &str) -> Result<Task, RuntimeError> {
        self.get(task_id).await?.map(|info| info.task).ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))
    }
}
