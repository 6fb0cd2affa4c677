use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use orchestrator_broker::{keys, Broker};
use orchestrator_core::HookViolation;
use parking_lot::Mutex;
use regex::Regex;
use tracing::warn;

use crate::context::HookContext;
use crate::descriptor::{HookDescriptor, HookType};
use crate::handler::{HookDecision, HookHandler, HookOutcome};

/// One dangerous-pattern family, so a match can be attributed to a
/// category in the violation record.
struct PatternSet {
    category: &'static str,
    patterns: Vec<Regex>,
}

fn compiled(category: &'static str, raw: &[&str]) -> PatternSet {
    PatternSet {
        category,
        patterns: raw.iter().filter_map(|p| Regex::new(p).ok()).collect(),
    }
}

/// Per-agent rolling 60s resource-budget tracker. Shape mirrors
/// `rate_limiting::RateLimiter`'s sliding-window bucket: a vector of
/// timestamps pruned to the window on each check, rather than a fixed
/// token-bucket refill.
#[derive(Default)]
struct AgentBucket {
    api_calls: Vec<Instant>,
    file_writes: Vec<Instant>,
    bytes_written: u64,
}

pub struct ResourceBudget {
    pub api_call_limit: usize,
    pub file_write_limit: usize,
    pub file_size_limit_bytes: u64,
    pub window: Duration,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            api_call_limit: 60,
            file_write_limit: 20,
            file_size_limit_bytes: 50 * 1024 * 1024,
            window: Duration::from_secs(60),
        }
    }
}

pub struct SafetyHook {
    descriptor: HookDescriptor,
    dangerous: Vec<PatternSet>,
    whitelist: Vec<Regex>,
    budget: ResourceBudget,
    buckets: Mutex<HashMap<String, AgentBucket>>,
    broker: Arc<dyn Broker>,
}

impl SafetyHook {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self::with_budget(broker, ResourceBudget::default())
    }

    pub fn with_budget(broker: Arc<dyn Broker>, budget: ResourceBudget) -> Self {
        let dangerous = vec![
            compiled(
                "destructive_filesystem",
                &[r"(?i)rm\s+-rf\s+/", r"(?i)format\s+c:", r"(?i)shutdown\s+(-h|/s|now)", r"(?i):\(\)\{\s*:\|:&\s*\};:"],
            ),
            compiled(
                "secret_access",
                &[
                    r"(?i)\.ssh/id_rsa",
                    r"(?i)/etc/shadow",
                    r"(?i)bearer\s+[a-z0-9._-]{16,}",
                    r"(?i)api[_-]?key\s*[:=]\s*['\x22]?[a-z0-9]{16,}",
                ],
            ),
            compiled(
                "sql_wipe",
                &[r"(?i)drop\s+table", r"(?i)truncate\s+table", r"(?i)delete\s+from\s+\w+\s*;?\s*$"],
            ),
            compiled("script_injection", &[r"(?i)<script[^>]*>.*?</script>", r"(?i)javascript:", r"(?i)on(load|error)\s*="]),
        ];
        let whitelist = vec![
            Regex::new(r"(?i)rm\s+-rf\s+/tmp/").expect("valid regex"),
            Regex::new(r"(?i)drop\s+table\s+if\s+not\s+exists").expect("valid regex"),
        ];
        Self {
            descriptor: HookDescriptor::new("pre-execution-safety", "pre-execution-safety", HookType::PreTask, 100)
                .with_description("blocks dangerous prompts/commands and enforces per-agent resource budgets"),
            dangerous,
            whitelist,
            budget,
            buckets: Mutex::new(HashMap::new()),
            broker,
        }
    }

    async fn publish_security_alert(&self, task_id: &str, reason: &str, violations: &[HookViolation]) {
        let record = serde_json::json!({
            "task_id": task_id,
            "reason": reason,
            "violations": violations,
            "timestamp_ms": orchestrator_core::now_ms(),
        });
        let Ok(payload) = serde_json::to_string(&record) else { return };
        if let Err(err) = self.broker.publish(keys::CHANNEL_SECURITY_ALERTS, payload).await {
            warn!(task_id = %task_id, error = %err, "failed to publish security alert");
        }
    }

    fn is_whitelisted(&self, text: &str) -> bool {
        self.whitelist.iter().any(|r| r.is_match(text))
    }

    fn scan_text(&self, text: &str) -> Vec<HookViolation> {
        if self.is_whitelisted(text) {
            return Vec::new();
        }
        let mut violations = Vec::new();
        for set in &self.dangerous {
            for pattern in &set.patterns {
                if let Some(matched) = pattern.find(text) {
                    violations.push(HookViolation {
                        violation_type: "dangerous_pattern".to_string(),
                        category: set.category.to_string(),
                        matched_pattern: matched.as_str().to_string(),
                        reason: format!("matched {} pattern", set.category),
                    });
                }
            }
        }
        violations
    }

    fn check_budget(&self, agent_id: &str, file_count: usize, total_bytes: u64) -> Option<HookViolation> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(agent_id.to_string()).or_default();
        let now = Instant::now();
        let window_start = now - self.budget.window;
        bucket.api_calls.retain(|t| *t > window_start);
        bucket.file_writes.retain(|t| *t > window_start);

        bucket.api_calls.push(now);
        for _ in 0..file_count {
            bucket.file_writes.push(now);
        }
        bucket.bytes_written += total_bytes;

        if bucket.api_calls.len() > self.budget.api_call_limit {
            return Some(HookViolation {
                violation_type: "resource_budget".to_string(),
                category: "api_call_rate".to_string(),
                matched_pattern: String::new(),
                reason: format!("exceeded {} API calls in {:?}", self.budget.api_call_limit, self.budget.window),
            });
        }
        if bucket.file_writes.len() > self.budget.file_write_limit {
            return Some(HookViolation {
                violation_type: "resource_budget".to_string(),
                category: "file_write_rate".to_string(),
                matched_pattern: String::new(),
                reason: format!("exceeded {} file writes in {:?}", self.budget.file_write_limit, self.budget.window),
            });
        }
        if bucket.bytes_written > self.budget.file_size_limit_bytes {
            return Some(HookViolation {
                violation_type: "resource_budget".to_string(),
                category: "file_size".to_string(),
                matched_pattern: String::new(),
                reason: format!("exceeded {} byte file-size budget", self.budget.file_size_limit_bytes),
            });
        }
        None
    }
}

#[async_trait]
impl HookHandler for SafetyHook {
    fn descriptor(&self) -> HookDescriptor {
        self.descriptor.clone()
    }

    async fn validate(&self, ctx: &HookContext) -> HookDecision {
        let mut violations = self.scan_text(&ctx.task.prompt);
        if let Some(command) = ctx.task.metadata.get("command") {
            violations.extend(self.scan_text(command));
        }
        if let Some(files) = &ctx.task.files {
            for path in files {
                violations.extend(self.scan_text(path));
            }
        }

        if !violations.is_empty() {
            let reason = "blocked by security policy".to_string();
            self.publish_security_alert(&ctx.task.id, &reason, &violations).await;
            return HookDecision::Block { reason, violations };
        }

        if let Some(agent) = &ctx.agent {
            let file_count = ctx.task.files.as_ref().map(|f| f.len()).unwrap_or(0);
            let estimated_bytes = ctx.task.estimated_tokens() as u64 * 4;
            if let Some(violation) = self.check_budget(&agent.id, file_count, estimated_bytes) {
                let reason = "blocked by resource budget policy".to_string();
                let violations = vec![violation];
                self.publish_security_alert(&ctx.task.id, &reason, &violations).await;
                return HookDecision::Block { reason, violations };
            }
        }

        HookDecision::Allow
    }

    async fn execute(&self, _ctx: &mut HookContext) -> HookOutcome {
        HookOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::InMemoryBroker;
    use orchestrator_core::{Priority, Task};

    fn ctx_with_prompt(prompt: &str) -> HookContext {
        HookContext::new(Task::new(Some("t1".into()), None, prompt.to_string(), Priority::Normal, 1).unwrap())
    }

    #[tokio::test]
    async fn blocks_rm_rf_root() {
        let hook = SafetyHook::new(Arc::new(InMemoryBroker::new()));
        let decision = hook.validate(&ctx_with_prompt("please run rm -rf / now")).await;
        assert!(decision.is_block());
    }

    #[tokio::test]
    async fn blocked_prompt_publishes_security_alert() {
        let broker = Arc::new(InMemoryBroker::new());
        let hook = SafetyHook::new(broker.clone());
        let mut sub = broker.psubscribe(keys::CHANNEL_SECURITY_ALERTS).await.unwrap();
        hook.validate(&ctx_with_prompt("please run rm -rf / now")).await;
        let message = sub.recv().await.unwrap();
        assert!(message.payload.contains("rm -rf"));
    }

    #[tokio::test]
    async fn whitelists_rm_rf_tmp() {
        let hook = SafetyHook::new(Arc::new(InMemoryBroker::new()));
        let decision = hook.validate(&ctx_with_prompt("run rm -rf /tmp/scratch to clean up")).await;
        assert!(matches!(decision, HookDecision::Allow));
    }

    #[tokio::test]
    async fn allows_benign_prompt() {
        let hook = SafetyHook::new(Arc::new(InMemoryBroker::new()));
        let decision = hook.validate(&ctx_with_prompt("summarize this document")).await;
        assert!(matches!(decision, HookDecision::Allow));
    }

    #[tokio::test]
    async fn blocks_after_exceeding_api_call_budget() {
        let hook = SafetyHook::with_budget(
            Arc::new(InMemoryBroker::new()),
            ResourceBudget { api_call_limit: 2, ..ResourceBudget::default() },
        );
        let mut ctx = ctx_with_prompt("do work");
        ctx.agent = Some(orchestrator_core::Agent::new("agent-1", "claude-3"));
        assert!(matches!(hook.validate(&ctx).await, HookDecision::Allow));
        assert!(matches!(hook.validate(&ctx).await, HookDecision::Allow));
        assert!(hook.validate(&ctx).await.is_block());
    }
}
