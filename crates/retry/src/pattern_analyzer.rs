use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use orchestrator_broker::{keys, Broker};
use orchestrator_core::{now_ms, ErrorClass};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RetryError;
use crate::strategy::AdaptiveHint;

/// Running tally of recovery outcomes for one `(agent, error_class)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternStats {
    pub attempts: u32,
    pub successes: u32,
    pub total_recovery_ms: u64,
}

impl PatternStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn avg_recovery(&self) -> Duration {
        if self.successes == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.total_recovery_ms / self.successes as u64)
        }
    }
}

/// A notable-failure-pattern notification emitted on each analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternNotification {
    pub agent: String,
    pub error_class: ErrorClass,
    pub kind: &'static str,
    pub success_rate: f64,
    pub avg_recovery_ms: u64,
    pub detected_at_ms: u64,
}

/// Tracks per-`(agent, class)` recovery outcomes and flags problem pairs:
/// success rate under 30% over at least 10 attempts, or average recovery
/// time over 5 minutes over at least 5 successes.
pub struct PatternAnalyzer {
    broker: Arc<dyn Broker>,
    stats: RwLock<HashMap<(String, ErrorClass), PatternStats>>,
    min_attempts: u32,
    min_successes: u32,
    low_success_rate: f64,
    slow_recovery: Duration,
}

impl PatternAnalyzer {
    pub fn new(
        broker: Arc<dyn Broker>,
        min_attempts: u32,
        min_successes: u32,
        low_success_rate: f64,
        slow_recovery: Duration,
    ) -> Self {
        Self {
            broker,
            stats: RwLock::new(HashMap::new()),
            min_attempts,
            min_successes,
            low_success_rate,
            slow_recovery,
        }
    }

    pub fn record_attempt(&self, agent: &str, class: ErrorClass) {
        let mut stats = self.stats.write();
        stats.entry((agent.to_string(), class)).or_default().attempts += 1;
    }

    pub fn record_recovery(&self, agent: &str, class: ErrorClass, recovery_time: Duration) {
        let mut stats = self.stats.write();
        let entry = stats.entry((agent.to_string(), class)).or_default();
        entry.successes += 1;
        entry.total_recovery_ms += recovery_time.as_millis() as u64;
    }

    pub fn hint_for(&self, agent: &str, class: ErrorClass) -> Option<AdaptiveHint> {
        let stats = self.stats.read();
        let entry = stats.get(&(agent.to_string(), class))?;
        if entry.attempts == 0 {
            return None;
        }
        Some(AdaptiveHint { success_rate: entry.success_rate(), avg_recovery_time: entry.avg_recovery() })
    }

    /// One analysis pass: scans the in-process tallies, persists a snapshot,
    /// and returns the notifications for pairs that cross a threshold. Run
    /// on a 10-minute cycle by [`crate::engine::RetryEngine::run`].
    pub async fn analyze(&self) -> Result<Vec<PatternNotification>, RetryError> {
        let snapshot: Vec<((String, ErrorClass), PatternStats)> =
            self.stats.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut notifications = Vec::new();
        for ((agent, class), stat) in snapshot {
            let payload = serde_json::to_string(&stat)?;
            self.broker.hset(keys::RECOVERY_PATTERNS, &format!("{agent}:{class}"), payload).await?;

            if stat.attempts >= self.min_attempts && stat.success_rate() < self.low_success_rate {
                notifications.push(PatternNotification {
                    agent: agent.clone(),
                    error_class: class,
                    kind: "low_success_rate",
                    success_rate: stat.success_rate(),
                    avg_recovery_ms: stat.avg_recovery().as_millis() as u64,
                    detected_at_ms: now_ms(),
                });
            }
            if stat.successes >= self.min_successes && stat.avg_recovery() > self.slow_recovery {
                notifications.push(PatternNotification {
                    agent,
                    error_class: class,
                    kind: "slow_recovery",
                    success_rate: stat.success_rate(),
                    avg_recovery_ms: stat.avg_recovery().as_millis() as u64,
                    detected_at_ms: now_ms(),
                });
            }
        }

        for notification in &notifications {
            let payload = serde_json::to_string(notification)?;
            self.broker.publish(keys::CHANNEL_ALERTS_CRITICAL, payload).await?;
        }

        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;

    #[tokio::test]
    async fn flags_low_success_rate_pair() {
        let analyzer = PatternAnalyzer::new(Arc::new(InMemoryBroker::new()), 10, 5, 0.3, Duration::from_secs(300));
        for _ in 0..10 {
            analyzer.record_attempt("claude-1", ErrorClass::Connection);
        }
        for _ in 0..2 {
            analyzer.record_recovery("claude-1", ErrorClass::Connection, Duration::from_secs(1));
        }
        let notifications = analyzer.analyze().await.unwrap();
        assert!(notifications.iter().any(|n| n.kind == "low_success_rate"));
    }

    #[tokio::test]
    async fn healthy_pattern_produces_no_notification() {
        let analyzer = PatternAnalyzer::new(Arc::new(InMemoryBroker::new()), 10, 5, 0.3, Duration::from_secs(300));
        for _ in 0..10 {
            analyzer.record_attempt("claude-1", ErrorClass::Connection);
            analyzer.record_recovery("claude-1", ErrorClass::Connection, Duration::from_secs(1));
        }
        let notifications = analyzer.analyze().await.unwrap();
        assert!(notifications.is_empty());
    }
}
