//! Thin wrapper around publishing a [`TransactionEvent`] to the channel
//! pattern the transaction logger subscribes to. Failures to publish are
//! logged and swallowed: an event is an observability side-channel, never
//! something a task's outcome should depend on.

use std::sync::Arc;

use orchestrator_broker::Broker;
use orchestrator_core::{now_ms, Task};
use orchestrator_txlog::TransactionEvent;
use tracing::warn;

pub async fn publish(
    broker: &Arc<dyn Broker>,
    channel: impl Into<String>,
    event_type: &str,
    task: &Task,
    agent_id: &str,
    outcome: Option<&str>,
) {
    let channel = channel.into();
    let mut event = TransactionEvent::new(&channel, event_type, now_ms());
    event.task_id = Some(task.id.clone());
    event.task_type = task.task_type.clone();
    event.queue = Some(agent_id.to_string());
    event.agent_id = Some(agent_id.to_string());
    event.outcome = outcome.map(str::to_string);

    match serde_json::to_string(&event) {
        Ok(payload) => {
            if let Err(err) = broker.publish(&channel, payload).await {
                warn!(channel = %channel, error = %err, "failed to publish transaction event");
            }
        }
        Err(err) => warn!(channel = %channel, error = %err, "failed to serialize transaction event"),
    }
}
