use std::collections::HashMap;
use std::sync::Arc;

use orchestrator_broker::{keys, Broker};
use serde::Serialize;

use crate::error::TxLogError;
use crate::event::{day_bucket_for, TransactionEvent};

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub task_type: Option<String>,
    pub queue: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimelineBucket {
    pub hour_start_ms: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueCount {
    pub queue: String,
    pub count: usize,
}

pub struct TxLogQuery {
    broker: Arc<dyn Broker>,
}

impl TxLogQuery {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    fn days_between(start_ms: u64, end_ms: u64) -> Vec<String> {
        let mut days = Vec::new();
        let mut cursor = start_ms;
        loop {
            let day = day_bucket_for(cursor);
            if days.last() != Some(&day) {
                days.push(day);
            }
            cursor += 86_400_000;
            if cursor > end_ms {
                break;
            }
        }
        let end_day = day_bucket_for(end_ms);
        if days.last() != Some(&end_day) {
            days.push(end_day);
        }
        days
    }

    /// Returns events in `[start_ms, end_ms]`, optionally narrowed to a
    /// task type and/or queue via the corresponding index sets.
    pub async fn events_in_window(
        &self,
        start_ms: u64,
        end_ms: u64,
        filter: &EventFilter,
    ) -> Result<Vec<TransactionEvent>, TxLogError> {
        let mut events = Vec::new();
        for day in Self::days_between(start_ms, end_ms) {
            let day_key = keys::txlog_day(&day);
            let ids = self
                .broker
                .zrangebyscore(&day_key, start_ms as f64, end_ms as f64)
                .await?;

            let payload_key = format!("{day_key}:payload");
            for id in ids {
                let Some(raw) = self.broker.hget(&payload_key, &id).await? else {
                    continue;
                };
                let event: TransactionEvent = serde_json::from_str(&raw)?;
                if let Some(task_type) = &filter.task_type {
                    if event.task_type.as_deref() != Some(task_type.as_str()) {
                        continue;
                    }
                }
                if let Some(queue) = &filter.queue {
                    if event.queue.as_deref() != Some(queue.as_str()) {
                        continue;
                    }
                }
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.timestamp_ms);
        Ok(events)
    }

    /// Per-hour event counts across the window, for dashboarding.
    pub async fn hourly_timeline(&self, start_ms: u64, end_ms: u64) -> Result<Vec<TimelineBucket>, TxLogError> {
        let events = self.events_in_window(start_ms, end_ms, &EventFilter::default()).await?;
        let mut buckets: HashMap<u64, usize> = HashMap::new();
        for event in &events {
            let hour_start = (event.timestamp_ms / 3_600_000) * 3_600_000;
            *buckets.entry(hour_start).or_insert(0) += 1;
        }
        let mut result: Vec<TimelineBucket> = buckets
            .into_iter()
            .map(|(hour_start_ms, count)| TimelineBucket { hour_start_ms, count })
            .collect();
        result.sort_by_key(|b| b.hour_start_ms);
        Ok(result)
    }

    /// Top-N busiest queues across the window, found by enumerating each
    /// day's `txlog:queue:*:{day}` index sets.
    pub async fn top_queues(&self, start_ms: u64, end_ms: u64, n: usize) -> Result<Vec<QueueCount>, TxLogError> {
        let mut totals: HashMap<String, usize> = HashMap::new();
        for day in Self::days_between(start_ms, end_ms) {
            let pattern = format!("txlog:queue:*:{day}");
            for key in self.broker.keys(&pattern).await? {
                let queue = key
                    .strip_prefix("txlog:queue:")
                    .and_then(|rest| rest.strip_suffix(&format!(":{day}")))
                    .unwrap_or(&key)
                    .to_string();
                let count = self.broker.scard(&key).await? as usize;
                *totals.entry(queue).or_insert(0) += count;
            }
        }
        let mut result: Vec<QueueCount> = totals
            .into_iter()
            .map(|(queue, count)| QueueCount { queue, count })
            .collect();
        result.sort_by(|a, b| b.count.cmp(&a.count));
        result.truncate(n);
        Ok(result)
    }

    /// Fraction of events in the window whose outcome is `"failed"`.
    pub async fn error_rate(&self, start_ms: u64, end_ms: u64) -> Result<f64, TxLogError> {
        let events = self.events_in_window(start_ms, end_ms, &EventFilter::default()).await?;
        if events.is_empty() {
            return Ok(0.0);
        }
        let failed = events.iter().filter(|e| e.outcome.as_deref() == Some("failed")).count();
        Ok(failed as f64 / events.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TransactionEvent;
    use orchestrator_broker::InMemoryBroker;

    fn make(channel: &str, ts: u64, outcome: Option<&str>) -> TransactionEvent {
        let mut e = TransactionEvent::new(channel, "complete", ts);
        e.outcome = outcome.map(String::from);
        e.queue = Some("agent-a".into());
        e
    }

    #[tokio::test]
    async fn events_in_window_filters_by_timestamp() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let day_key = keys::txlog_day("2024-01-15");
        let e1 = make("queue:a:complete", 1_705_276_800_000, Some("success"));
        let e2 = make("queue:a:complete", 1_705_276_900_000, Some("failed"));
        broker.zadd(&day_key, &e1.id, e1.timestamp_ms as f64).await.unwrap();
        broker
            .hset(&format!("{day_key}:payload"), &e1.id, serde_json::to_string(&e1).unwrap())
            .await
            .unwrap();
        broker.zadd(&day_key, &e2.id, e2.timestamp_ms as f64).await.unwrap();
        broker
            .hset(&format!("{day_key}:payload"), &e2.id, serde_json::to_string(&e2).unwrap())
            .await
            .unwrap();

        let query = TxLogQuery::new(broker);
        let events = query
            .events_in_window(1_705_276_800_000, 1_705_276_850_000, &EventFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, e1.id);
    }

    #[tokio::test]
    async fn error_rate_computes_failed_fraction() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let day_key = keys::txlog_day("2024-01-15");
        for (ts, outcome) in [
            (1_705_276_800_000u64, Some("success")),
            (1_705_276_800_100, Some("failed")),
            (1_705_276_800_200, Some("failed")),
        ] {
            let e = make("queue:a:complete", ts, outcome);
            broker.zadd(&day_key, &e.id, e.timestamp_ms as f64).await.unwrap();
            broker
                .hset(&format!("{day_key}:payload"), &e.id, serde_json::to_string(&e).unwrap())
                .await
                .unwrap();
        }
        let query = TxLogQuery::new(broker);
        let rate = query.error_rate(1_705_276_800_000, 1_705_276_800_200).await.unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
