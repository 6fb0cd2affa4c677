use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use orchestrator_broker::{keys, Broker};
use orchestrator_core::{now_ms, ErrorClass};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BreakerState {
    state: State,
    failure_count: u32,
    opened_at_ms: Option<u64>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self { state: State::Closed, failure_count: 0, opened_at_ms: None }
    }
}

/// Per-`(agent, error_class)` circuit breaker. Closed state counts
/// consecutive failures; crossing `threshold` opens the circuit for
/// `cooldown`, after which the next attempt is admitted in half-open and
/// its outcome alone decides whether the circuit closes or reopens.
pub struct CircuitBreakerRegistry {
    broker: Arc<dyn Broker>,
    threshold: u32,
    cooldown: Duration,
    cache: RwLock<HashMap<String, BreakerState>>,
}

fn breaker_key(agent: &str, class: ErrorClass) -> String {
    format!("{agent}:{class}")
}

impl CircuitBreakerRegistry {
    pub fn new(broker: Arc<dyn Broker>, threshold: u32, cooldown: Duration) -> Self {
        Self { broker, threshold, cooldown, cache: RwLock::new(HashMap::new()) }
    }

    fn read_or_default(&self, key: &str) -> BreakerState {
        self.cache.read().get(key).cloned().unwrap_or_default()
    }

    /// Whether a task may be dispatched to `agent` for `class` right now.
    /// Transitions `Open -> HalfOpen` as a side effect once the cooldown has
    /// elapsed, admitting exactly the next attempt.
    pub fn allow_attempt(&self, agent: &str, class: ErrorClass) -> bool {
        let key = breaker_key(agent, class);
        let mut cache = self.cache.write();
        let state = cache.entry(key).or_default();
        match state.state {
            State::Closed => true,
            State::HalfOpen => true,
            State::Open => {
                let opened_at = state.opened_at_ms.unwrap_or(0);
                if now_ms().saturating_sub(opened_at) >= self.cooldown.as_millis() as u64 {
                    state.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self, agent: &str, class: ErrorClass) -> Result<(), RetryError> {
        let key = breaker_key(agent, class);
        let snapshot = {
            let mut cache = self.cache.write();
            let state = cache.entry(key.clone()).or_default();
            match state.state {
                State::HalfOpen => {
                    state.state = State::Closed;
                    state.failure_count = 0;
                    state.opened_at_ms = None;
                }
                State::Closed => {
                    state.failure_count = state.failure_count.saturating_sub(1);
                }
                State::Open => {}
            }
            state.clone()
        };
        self.persist(&key, &snapshot).await
    }

    pub async fn record_failure(&self, agent: &str, class: ErrorClass) -> Result<(), RetryError> {
        let key = breaker_key(agent, class);
        let snapshot = {
            let mut cache = self.cache.write();
            let state = cache.entry(key.clone()).or_default();
            match state.state {
                State::HalfOpen => {
                    state.state = State::Open;
                    state.opened_at_ms = Some(now_ms());
                }
                State::Closed => {
                    state.failure_count += 1;
                    if state.failure_count >= self.threshold {
                        state.state = State::Open;
                        state.opened_at_ms = Some(now_ms());
                    }
                }
                State::Open => {}
            }
            state.clone()
        };
        self.persist(&key, &snapshot).await
    }

    async fn persist(&self, key: &str, state: &BreakerState) -> Result<(), RetryError> {
        let payload = serde_json::to_string(state)?;
        self.broker.hset(keys::CIRCUIT_BREAKERS, key, payload).await?;
        Ok(())
    }

    pub fn is_open(&self, agent: &str, class: ErrorClass) -> bool {
        self.read_or_default(&breaker_key(agent, class)).state == State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(Arc::new(InMemoryBroker::new()), 3, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let reg = registry();
        for _ in 0..3 {
            reg.record_failure("claude-1", ErrorClass::Timeout).await.unwrap();
        }
        assert!(reg.is_open("claude-1", ErrorClass::Timeout));
        assert!(!reg.allow_attempt("claude-1", ErrorClass::Timeout));
    }

    #[tokio::test]
    async fn success_decrements_but_never_below_zero() {
        let reg = registry();
        reg.record_failure("claude-1", ErrorClass::Timeout).await.unwrap();
        reg.record_success("claude-1", ErrorClass::Timeout).await.unwrap();
        reg.record_success("claude-1", ErrorClass::Timeout).await.unwrap();
        assert!(!reg.is_open("claude-1", ErrorClass::Timeout));
        assert!(reg.allow_attempt("claude-1", ErrorClass::Timeout));
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let reg = registry();
        for _ in 0..3 {
            reg.record_failure("claude-1", ErrorClass::Timeout).await.unwrap();
        }
        {
            let mut cache = reg.cache.write();
            let s = cache.get_mut(&breaker_key("claude-1", ErrorClass::Timeout)).unwrap();
            s.opened_at_ms = Some(0);
        }
        assert!(reg.allow_attempt("claude-1", ErrorClass::Timeout));
        reg.record_failure("claude-1", ErrorClass::Timeout).await.unwrap();
        assert!(reg.is_open("claude-1", ErrorClass::Timeout));
    }
}
