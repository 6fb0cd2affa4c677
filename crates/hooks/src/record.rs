use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use orchestrator_broker::{keys, Broker};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::HookError;
use crate::handler::HookDecision;

/// The record of one hook's run within a chain execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerHookResult {
    pub hook_id: String,
    pub success: bool,
    pub duration_ms: u64,
    pub result: Option<serde_json::Value>,
    pub stop_chain: bool,
    pub decision: HookDecision,
}

/// The outcome of running every enabled hook of one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub hook_type: String,
    pub task_id: String,
    pub timestamp_ms: u64,
    pub results: Vec<PerHookResult>,
    pub blocked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookTypeMetrics {
    pub count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_duration_ms: u64,
}

impl HookTypeMetrics {
    pub fn average_duration_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.count as f64
        }
    }
}

/// Persists execution results (24h broker TTL) plus a bounded in-memory
/// history, and maintains per-hook-type aggregate metrics.
pub struct ExecutionHistory {
    broker: Arc<dyn Broker>,
    recent: Mutex<VecDeque<ExecutionResult>>,
    metrics: Mutex<HashMap<String, HookTypeMetrics>>,
    capacity: usize,
}

impl ExecutionHistory {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            recent: Mutex::new(VecDeque::new()),
            metrics: Mutex::new(HashMap::new()),
            capacity: 100,
        }
    }

    pub async fn record(&self, execution: ExecutionResult) -> Result<(), HookError> {
        {
            let mut metrics = self.metrics.lock();
            let entry = metrics.entry(execution.hook_type.clone()).or_default();
            for result in &execution.results {
                entry.count += 1;
                entry.total_duration_ms += result.duration_ms;
                if result.success {
                    entry.success_count += 1;
                } else {
                    entry.failure_count += 1;
                }
            }
        }
        {
            let mut recent = self.recent.lock();
            recent.push_back(execution.clone());
            while recent.len() > self.capacity {
                recent.pop_front();
            }
        }

        let key = format!("hook:execution:{}:{}", execution.hook_type, execution.task_id);
        let payload = serde_json::to_string(&execution)?;
        self.broker.set_with_ttl(&key, payload.clone(), Duration::from_secs(24 * 3600)).await?;

        let channel = if execution.blocked {
            keys::CHANNEL_HOOK_EXECUTION_ERROR
        } else {
            keys::CHANNEL_HOOK_EXECUTION_COMPLETE
        };
        self.broker.publish(channel, payload).await?;
        Ok(())
    }

    pub fn recent(&self) -> Vec<ExecutionResult> {
        self.recent.lock().iter().cloned().collect()
    }

    pub fn metrics_for(&self, hook_type: &str) -> HookTypeMetrics {
        self.metrics.lock().get(hook_type).cloned().unwrap_or_default()
    }
}
