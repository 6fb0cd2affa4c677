use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single lifecycle event fanned out over pub/sub and captured durably
/// by the logger: queue enqueue/dequeue/complete/failed, agent task
/// assignment/completion/failure, DLQ retry/archive, and health
/// corrections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: String,
    pub timestamp_ms: u64,
    pub channel: String,
    pub event_type: String,
    pub task_id: Option<String>,
    pub task_type: Option<String>,
    pub queue: Option<String>,
    pub agent_id: Option<String>,
    pub outcome: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl TransactionEvent {
    pub fn new(channel: impl Into<String>, event_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            id: orchestrator_core::generate_task_id(),
            timestamp_ms,
            channel: channel.into(),
            event_type: event_type.into(),
            task_id: None,
            task_type: None,
            queue: None,
            agent_id: None,
            outcome: None,
            metadata: HashMap::new(),
        }
    }

    pub fn day_bucket(&self) -> String {
        day_bucket_for(self.timestamp_ms)
    }
}

/// Formats a millisecond timestamp as a `YYYY-MM-DD` bucket key, the unit
/// every day-keyed index (`txlog:{day}` and friends) is partitioned by.
pub fn day_bucket_for(timestamp_ms: u64) -> String {
    let secs = (timestamp_ms / 1000) as i64;
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bucket_formats_as_iso_date() {
        // 2024-01-15T00:00:00Z
        assert_eq!(day_bucket_for(1_705_276_800_000), "2024-01-15");
    }
}
