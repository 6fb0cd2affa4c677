use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_broker::{keys, Broker};
use parking_lot::Mutex;
use tracing::info;

use crate::context::HookContext;
use crate::descriptor::{HookDescriptor, HookType};
use crate::handler::{HookHandler, HookOutcome};

const WINDOW_SIZE: usize = 200;

#[derive(Default)]
struct RunningTotals {
    durations_ms: VecDeque<u64>,
    completed: u64,
    failed: u64,
    last_memory_bytes: Option<u64>,
    consecutive_memory_increases: u32,
}

fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Writes a structured execution record, maintains rolling per-(agent,
/// task-type) duration windows with p50/p90/p99, and raises anomaly
/// alerts: duration > 1.5x p99 (warning), failure rate > 20% (critical),
/// monotonic per-task memory growth > 10% over 3+ consecutive tasks
/// (warning).
pub struct LoggingHook {
    descriptor: HookDescriptor,
    broker: Arc<dyn Broker>,
    totals: Mutex<HashMap<(String, String), RunningTotals>>,
}

impl LoggingHook {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            descriptor: HookDescriptor::new("post-execution-logging", "post-execution-logging", HookType::PostTask, 90)
                .with_description("records execution metrics and raises duration/failure/memory anomalies"),
            broker,
            totals: Mutex::new(HashMap::new()),
        }
    }

    async fn publish_anomaly(&self, kind: &str, severity: &str, agent_id: &str, task_type: &str, detail: serde_json::Value) {
        let record = serde_json::json!({
            "kind": kind,
            "severity": severity,
            "agent_id": agent_id,
            "task_type": task_type,
            "detail": detail,
            "timestamp_ms": orchestrator_core::now_ms(),
        });
        let Ok(payload) = serde_json::to_string(&record) else { return };
        let _ = self.broker.zadd(keys::ANOMALIES_TIMELINE, &payload, orchestrator_core::now_ms() as f64).await;
        let channel = if severity == "critical" { keys::CHANNEL_ALERTS_CRITICAL } else { keys::CHANNEL_SECURITY_ALERTS };
        let _ = self.broker.publish(channel, payload).await;
        info!(kind, severity, agent_id, task_type, "anomaly detected");
    }
}

#[async_trait]
impl HookHandler for LoggingHook {
    fn descriptor(&self) -> HookDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, ctx: &mut HookContext) -> HookOutcome {
        let agent_id = ctx.agent.as_ref().map(|a| a.id.clone()).unwrap_or_else(|| "unknown".to_string());
        let task_type = ctx.task.task_type.clone().unwrap_or_else(|| "untyped".to_string());
        let duration_ms = ctx.execution.duration_ms.unwrap_or(0);
        let failed = ctx.execution.error.is_some();

        let record = serde_json::json!({
            "task_id": ctx.task.id,
            "agent_id": agent_id,
            "task_type": task_type,
            "duration_ms": duration_ms,
            "failed": failed,
            "timestamp_ms": orchestrator_core::now_ms(),
        });
        if let Ok(payload) = serde_json::to_string(&record) {
            let _ = self.broker.publish(keys::CHANNEL_LOGS_EXECUTION, payload).await;
        }
        let _ = self.broker.hincrby(&keys::metrics_agent(&agent_id), if failed { "failed" } else { "completed" }, 1).await;
        let _ = self.broker.hincrby(&keys::metrics_agent(&agent_id), "duration_total_ms", duration_ms as i64).await;
        let _ = self.broker.hincrby(&keys::metrics_task_type(&task_type), if failed { "failed" } else { "completed" }, 1).await;

        let (p99_exceeded, failure_rate_critical, memory_anomaly) = {
            let mut totals = self.totals.lock();
            let entry = totals.entry((agent_id.clone(), task_type.clone())).or_default();

            entry.durations_ms.push_back(duration_ms);
            while entry.durations_ms.len() > WINDOW_SIZE {
                entry.durations_ms.pop_front();
            }
            if failed {
                entry.failed += 1;
            } else {
                entry.completed += 1;
            }

            let mut sorted: Vec<u64> = entry.durations_ms.iter().copied().collect();
            sorted.sort_unstable();
            let p99 = percentile(&sorted, 0.99);
            let duration_anomaly = p99 > 0 && (duration_ms as f64) > 1.5 * (p99 as f64);

            let total = entry.completed + entry.failed;
            let failure_rate = if total == 0 { 0.0 } else { entry.failed as f64 / total as f64 };
            let failure_anomaly = total >= 5 && failure_rate > 0.20;

            let memory_bytes = ctx.task.metadata.get("memory_bytes").and_then(|v| v.parse::<u64>().ok());
            let mut mem_anomaly = false;
            if let Some(current) = memory_bytes {
                if let Some(prev) = entry.last_memory_bytes {
                    if prev > 0 && current as f64 > prev as f64 * 1.10 {
                        entry.consecutive_memory_increases += 1;
                    } else {
                        entry.consecutive_memory_increases = 0;
                    }
                }
                entry.last_memory_bytes = Some(current);
                mem_anomaly = entry.consecutive_memory_increases >= 3;
            }

            (duration_anomaly, failure_anomaly, mem_anomaly)
        };

        if p99_exceeded {
            self.publish_anomaly(
                "duration_exceeds_p99",
                "warning",
                &agent_id,
                &task_type,
                serde_json::json!({ "duration_ms": duration_ms }),
            )
            .await;
        }
        if failure_rate_critical {
            self.publish_anomaly("failure_rate_high", "critical", &agent_id, &task_type, serde_json::json!({})).await;
        }
        if memory_anomaly {
            self.publish_anomaly("memory_growth", "warning", &agent_id, &task_type, serde_json::json!({})).await;
        }

        HookOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::InMemoryBroker;
    use orchestrator_core::{Agent, Priority, Task};

    fn ctx(duration_ms: u64, failed: bool) -> HookContext {
        let mut ctx = HookContext::new(Task::new(Some("t1".into()), Some("analysis".into()), "x".into(), Priority::Normal, 1).unwrap());
        ctx.agent = Some(Agent::new("agent-a", "claude-3"));
        ctx.execution.duration_ms = Some(duration_ms);
        if failed {
            ctx.execution.error = Some("boom".into());
        }
        ctx
    }

    #[tokio::test]
    async fn increments_completed_counter() {
        let broker = Arc::new(InMemoryBroker::new());
        let hook = LoggingHook::new(broker.clone());
        hook.execute(&mut ctx(100, false)).await;
        let completed: i64 = broker
            .hget(&keys::metrics_agent("agent-a"), "completed")
            .await
            .unwrap()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn flags_failure_rate_anomaly_after_threshold() {
        let broker = Arc::new(InMemoryBroker::new());
        let hook = LoggingHook::new(broker.clone());
        for _ in 0..4 {
            hook.execute(&mut ctx(50, false)).await;
        }
        hook.execute(&mut ctx(50, true)).await;
        hook.execute(&mut ctx(50, true)).await;
        let timeline_count = broker.zcard(keys::ANOMALIES_TIMELINE).await.unwrap();
        assert!(timeline_count > 0);
    }
}
