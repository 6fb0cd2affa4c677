//! Key-space conventions. Centralized so every crate that touches Redis
//! agrees on the same layout without importing each other's internals.

/// Ready queue for `agent` at `priority` (0-4, see `orchestrator_core::Priority::class`).
pub fn ready_queue(agent: &str, priority_class: i64) -> String {
    format!("queue:{agent}:p:{priority_class}")
}

/// In-flight list a worker BRPOPLPUSHes into while holding a task.
/// Per the unified naming resolution, this is keyed by agent, not task type.
pub fn in_flight(agent: &str) -> String {
    format!("in_flight:{agent}")
}

pub const RETRY_SCHEDULED: &str = "retry:scheduled";

pub fn retry_history(task_id: &str) -> String {
    format!("retry:history:{task_id}")
}

pub const DLQ_FAILED_TASKS: &str = "dlq:failed_tasks";
pub const CIRCUIT_BREAKERS: &str = "circuit:breakers";
pub const RECOVERY_PATTERNS: &str = "recovery:patterns";

pub fn metrics_agent(agent_id: &str) -> String {
    format!("metrics:agent:{agent_id}")
}

pub fn metrics_task_type(task_type: &str) -> String {
    format!("metrics:tasktype:{task_type}")
}

pub fn txlog_day(day: &str) -> String {
    format!("txlog:{day}")
}

pub fn txlog_type_day(task_type: &str, day: &str) -> String {
    format!("txlog:type:{task_type}:{day}")
}

pub fn txlog_queue_day(queue: &str, day: &str) -> String {
    format!("txlog:queue:{queue}:{day}")
}

pub fn anomaly(kind: &str) -> String {
    format!("anomaly:{kind}")
}

pub const ANOMALIES_TIMELINE: &str = "anomalies:timeline";

pub fn routing_decision(task_id: &str) -> String {
    format!("routing:decision:{task_id}")
}

pub fn routing_stats(model: &str) -> String {
    format!("routing:stats:{model}")
}

pub fn task_info(task_id: &str) -> String {
    format!("task:{task_id}")
}

/// Pub/sub event channels.
pub const CHANNEL_HOOKS_EVENTS: &str = "hooks:events";
pub const CHANNEL_HOOKS_REGISTER: &str = "hooks:register";
pub const CHANNEL_HOOK_CONFIG_CHANGED: &str = "hook:config:changed";
pub const CHANNEL_HOOK_EXECUTION_COMPLETE: &str = "hook:execution:complete";
pub const CHANNEL_HOOK_EXECUTION_ERROR: &str = "hook:execution:error";
pub const CHANNEL_SECURITY_ALERTS: &str = "security:alerts";
pub const CHANNEL_ALERTS_CRITICAL: &str = "alerts:critical";
pub const CHANNEL_LOGS_EXECUTION: &str = "logs:execution";
