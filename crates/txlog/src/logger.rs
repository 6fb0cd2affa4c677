use std::collections::HashSet;
use std::sync::Arc;

use orchestrator_broker::{keys, Broker};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TxLogConfig;
use crate::error::TxLogError;
use crate::event::TransactionEvent;
use crate::file_sink::DailyFileSink;

/// Buffers lifecycle events and flushes them into the day/type/queue
/// indexes on an interval or once a batch-size threshold is hit.
pub struct TransactionLogger {
    broker: Arc<dyn Broker>,
    config: TxLogConfig,
    buffer: Mutex<Vec<TransactionEvent>>,
    file_sink: Option<DailyFileSink>,
}

impl TransactionLogger {
    pub fn new(broker: Arc<dyn Broker>, config: TxLogConfig) -> Result<Self, TxLogError> {
        let file_sink = config
            .file_sink_dir
            .as_ref()
            .map(DailyFileSink::new)
            .transpose()?;
        Ok(Self {
            broker,
            config,
            buffer: Mutex::new(Vec::new()),
            file_sink,
        })
    }

    /// Buffers an event, flushing immediately if the batch-size threshold
    /// is reached.
    pub async fn record(&self, event: TransactionEvent) -> Result<(), TxLogError> {
        let should_flush = {
            let mut buffer = self.buffer.lock();
            buffer.push(event);
            buffer.len() >= self.config.max_batch_size
        };
        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    /// Drains the buffer into the day-keyed sorted set plus type/queue
    /// index sets, applies retention via key expiry, and optionally
    /// appends each event to the day-rotated JSON-lines file.
    pub async fn flush(&self) -> Result<(), TxLogError> {
        let batch = {
            let mut buffer = self.buffer.lock();
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return Ok(());
        }

        let retention = std::time::Duration::from_secs(self.config.retention_days as u64 * 86_400);
        let mut touched_day_keys: HashSet<String> = HashSet::new();

        for event in &batch {
            let day = event.day_bucket();
            let day_key = keys::txlog_day(&day);
            let payload = serde_json::to_string(event)?;
            self.broker.zadd(&day_key, &event.id, event.timestamp_ms as f64).await?;
            self.broker.hset(&format!("{day_key}:payload"), &event.id, payload).await?;
            touched_day_keys.insert(day_key.clone());
            touched_day_keys.insert(format!("{day_key}:payload"));

            if let Some(task_type) = &event.task_type {
                let key = keys::txlog_type_day(task_type, &day);
                self.broker.sadd(&key, &event.id).await?;
                touched_day_keys.insert(key);
            }
            if let Some(queue) = &event.queue {
                let key = keys::txlog_queue_day(queue, &day);
                self.broker.sadd(&key, &event.id).await?;
                touched_day_keys.insert(key);
            }

            if let Some(sink) = &self.file_sink {
                if let Err(err) = sink.append(event) {
                    warn!(error = %err, "failed to append transaction event to file sink");
                }
            }
        }

        for key in touched_day_keys {
            self.broker.expire(&key, retention).await?;
        }

        debug!(count = batch.len(), "flushed transaction log batch");
        Ok(())
    }

    /// Subscribes to every configured event-channel pattern, buffering
    /// each parsed event, and runs the interval flush loop until
    /// cancelled. The buffer is flushed one last time before returning so
    /// no in-flight batch is lost on shutdown.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut subscriber_handles = Vec::new();
        for pattern in &self.config.subscribe_patterns {
            let logger = Arc::clone(&self);
            let pattern = pattern.clone();
            let cancel = cancel.clone();
            subscriber_handles.push(tokio::spawn(async move {
                logger.subscribe_loop(&pattern, cancel).await;
            }));
        }

        let mut interval = tokio::time::interval(self.config.flush_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.flush().await {
                        warn!(error = %err, "transaction log flush failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        for handle in subscriber_handles {
            let _ = handle.await;
        }
        self.flush().await?;
        Ok(())
    }

    async fn subscribe_loop(&self, pattern: &str, cancel: CancellationToken) {
        let mut subscription = match self.broker.psubscribe(pattern).await {
            Ok(sub) => sub,
            Err(err) => {
                warn!(pattern, error = %err, "failed to subscribe to event pattern");
                return;
            }
        };
        loop {
            tokio::select! {
                message = subscription.recv() => {
                    let Some(message) = message else { break };
                    match serde_json::from_str::<TransactionEvent>(&message.payload) {
                        Ok(event) => {
                            if let Err(err) = self.record(event).await {
                                warn!(error = %err, "failed to record transaction event");
                            }
                        }
                        Err(err) => warn!(error = %err, channel = %message.channel, "unparseable transaction event"),
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::InMemoryBroker;

    fn event(channel: &str, event_type: &str, ts: u64) -> TransactionEvent {
        TransactionEvent::new(channel, event_type, ts)
    }

    #[tokio::test]
    async fn record_flushes_once_batch_size_reached() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut config = TxLogConfig::default();
        config.max_batch_size = 2;
        let logger = TransactionLogger::new(broker.clone(), config).unwrap();

        logger.record(event("queue:a:enqueue", "enqueue", 1_705_276_800_000)).await.unwrap();
        assert_eq!(broker.zcard(&keys::txlog_day("2024-01-15")).await.unwrap(), 0);
        logger.record(event("queue:a:enqueue", "enqueue", 1_705_276_800_100)).await.unwrap();
        assert_eq!(broker.zcard(&keys::txlog_day("2024-01-15")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn flush_indexes_by_type_and_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let logger = TransactionLogger::new(broker.clone(), TxLogConfig::default()).unwrap();

        let mut evt = event("queue:a:enqueue", "enqueue", 1_705_276_800_000);
        evt.task_type = Some("code_review".into());
        evt.queue = Some("agent-a".into());
        logger.record(evt).await.unwrap();
        logger.flush().await.unwrap();

        assert_eq!(
            broker.scard(&keys::txlog_type_day("code_review", "2024-01-15")).await.unwrap(),
            1
        );
        assert_eq!(
            broker.scard(&keys::txlog_queue_day("agent-a", "2024-01-15")).await.unwrap(),
            1
        );
    }
}
