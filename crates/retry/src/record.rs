use orchestrator_core::{ErrorClass, Task};
use serde::{Deserialize, Serialize};

use crate::strategy::DelayStrategy;

/// A single scheduled retry. Persisted as the member payload in
/// `retry:scheduled` (score = `scheduled_for_ms`) and appended to
/// `retry:history:{task_id}` for audit. Carries the full task so the
/// processing loop can re-enqueue it onto the ready queue without a
/// second round trip to fetch it.
///
/// `override_max_attempts`, when `Some`, takes precedence over the error
/// class's table value — this is how `ForceRetry` restores the original
/// class's attempt budget after a task was pulled out of the dead-letter
/// queue rather than inheriting whatever attempt count it died at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecord {
    pub task: Task,
    pub attempt: u32,
    pub error_class: ErrorClass,
    pub error_message: String,
    pub strategy: DelayStrategy,
    pub scheduled_for_ms: u64,
    pub target_agent: String,
    pub override_max_attempts: Option<u32>,
}

impl RetryRecord {
    pub fn effective_max_attempts(&self, table_default: u32) -> u32 {
        self.override_max_attempts.unwrap_or(table_default)
    }
}

/// The outcome of asking the engine to schedule a retry for a failed task.
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    Scheduled(RetryRecord),
    DeadLettered { reason: String },
}
