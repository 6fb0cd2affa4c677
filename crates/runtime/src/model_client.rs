//! The boundary to the actual model provider. Real wiring (HTTP calls to
//! Anthropic/OpenAI/etc. endpoints) lives outside this crate; what's here
//! is the trait every agent runtime dispatches through plus the test
//! doubles used by the runtime's own unit tests and by integration tests
//! elsewhere in the workspace.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use orchestrator_core::Task;

/// Outcome of delegating a task to a model. `Err` carries the raw error
/// message exactly as the provider reported it; classification into an
/// `ErrorClass` is the retry engine's job, not the client's.
pub type ModelResult = Result<serde_json::Value, String>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn execute(&self, task: &Task) -> ModelResult;
}

/// Always succeeds with an empty result. Useful for wiring smoke tests
/// and for agents that exist only to exercise the hook pipeline.
pub struct NullModelClient;

#[async_trait]
impl ModelClient for NullModelClient {
    async fn execute(&self, _task: &Task) -> ModelResult {
        Ok(serde_json::json!({}))
    }
}

/// Scripted client for tests: replays a fixed sequence of outcomes across
/// calls (cycling once exhausted), optionally sleeping first to simulate
/// latency. Exactly what the retry-engine end-to-end scenarios need —
/// e.g. two rate-limit errors followed by a success.
pub struct SimulatedModelClient {
    outcomes: Vec<ModelResult>,
    call_count: AtomicUsize,
    delay: Duration,
}

impl SimulatedModelClient {
    pub fn new(outcomes: Vec<ModelResult>) -> Self {
        Self { outcomes, call_count: AtomicUsize::new(0), delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for SimulatedModelClient {
    async fn execute(&self, _task: &Task) -> ModelResult {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.outcomes[index % self.outcomes.len()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::Priority;

    fn task() -> Task {
        Task::new(Some("t1".into()), None, "hi".into(), Priority::Normal, 1).unwrap()
    }

    #[tokio::test]
    async fn null_client_always_succeeds() {
        assert!(NullModelClient.execute(&task()).await.is_ok());
    }

    #[tokio::test]
    async fn simulated_client_replays_then_cycles() {
        let client = SimulatedModelClient::new(vec![Err("429 rate limit".into()), Err("429 rate limit".into()), Ok(serde_json::json!("done"))]);
        assert!(client.execute(&task()).await.is_err());
        assert!(client.execute(&task()).await.is_err());
        assert!(client.execute(&task()).await.is_ok());
        assert!(client.execute(&task()).await.is_err());
        assert_eq!(client.call_count(), 4);
    }
}
