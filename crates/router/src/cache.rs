use std::sync::Arc;
use std::time::Duration;

use orchestrator_broker::{keys, Broker};

use crate::decision::RoutingDecision;
use crate::error::RouterError;

const DECISION_TTL: Duration = Duration::from_secs(24 * 3600);

/// Persists routing decisions (24h TTL, keyed by task id) and per-model
/// routing counters used by the admin surface's routing-stats view.
pub struct RoutingCache {
    broker: Arc<dyn Broker>,
}

impl RoutingCache {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub async fn store(&self, decision: &RoutingDecision, model: &str) -> Result<(), RouterError> {
        let payload = serde_json::to_string(decision)?;
        self.broker.set_with_ttl(&keys::routing_decision(&decision.task_id), payload, DECISION_TTL).await?;
        self.broker.hincrby(&keys::routing_stats(model), "routed_count", 1).await?;
        Ok(())
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<RoutingDecision>, RouterError> {
        match self.broker.get(&keys::routing_decision(task_id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn routed_count(&self, model: &str) -> Result<i64, RouterError> {
        Ok(self
            .broker
            .hget(&keys::routing_stats(model), "routed_count")
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;

    fn decision() -> RoutingDecision {
        RoutingDecision {
            task_id: "t1".into(),
            primary_agent: "claude".into(),
            fallbacks: vec![],
            score: 80.0,
            confidence: 0.9,
            reason: "strong capability match (score 80.0)".into(),
            decided_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let cache = RoutingCache::new(Arc::new(InMemoryBroker::new()));
        cache.store(&decision(), "claude-3").await.unwrap();
        let fetched = cache.get("t1").await.unwrap().unwrap();
        assert_eq!(fetched.primary_agent, "claude");
        assert_eq!(cache.routed_count("claude-3").await.unwrap(), 1);
    }
}
