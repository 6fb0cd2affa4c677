use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_broker::{keys, Broker};
use orchestrator_core::{now_ms, Agent, AgentStatus, Priority, Task};
use orchestrator_hooks::{HookContext, RoutingAdvice, RoutingAdvisor};
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::RoutingCache;
use crate::decision::{build_decision, Candidate, RoutingDecision};
use crate::error::RouterError;
use crate::scoring::{score_agent, HistoricalStats};

const PRIORITY_CLASSES: [Priority; 5] =
    [Priority::Critical, Priority::High, Priority::Normal, Priority::Low, Priority::Deferred];

/// Scores candidate agents and picks the best fit for a task. Holds the
/// live agent roster in-process (updated via heartbeats/registration) and
/// delegates persistence of decisions/counters to [`RoutingCache`].
pub struct Router {
    broker: Arc<dyn Broker>,
    agents: RwLock<HashMap<String, Agent>>,
    cache: RoutingCache,
}

impl Router {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { cache: RoutingCache::new(broker.clone()), broker, agents: RwLock::new(HashMap::new()) }
    }

    pub fn register_agent(&self, agent: Agent) {
        self.agents.write().insert(agent.id.clone(), agent);
    }

    pub fn update_agent(&self, agent: Agent) {
        self.agents.write().insert(agent.id.clone(), agent);
    }

    pub fn agent(&self, id: &str) -> Option<Agent> {
        self.agents.read().get(id).cloned()
    }

    fn routable_agents(&self) -> Vec<Agent> {
        self.agents.read().values().filter(|a| a.status.is_routable()).cloned().collect()
    }

    /// Count of every registered agent, routable or not. Feeds the
    /// system snapshot threaded through the hook pipeline.
    pub fn agent_count(&self) -> usize {
        self.agents.read().len()
    }

    /// Sum of ready-queue depth across every registered agent and
    /// priority class, for the same system snapshot.
    pub async fn total_queue_depth(&self) -> Result<u64, RouterError> {
        let ids: Vec<String> = self.agents.read().keys().cloned().collect();
        let mut total = 0u64;
        for id in ids {
            total += self.queue_depth(&id).await?;
        }
        Ok(total)
    }

    async fn historical_stats(&self, agent_id: &str) -> Result<HistoricalStats, RouterError> {
        let fields = self.broker.hgetall(&keys::metrics_agent(agent_id)).await?;
        let get = |k: &str| fields.get(k).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        Ok(HistoricalStats { completed: get("completed"), failed: get("failed"), duration_total_ms: get("duration_total_ms") })
    }

    async fn queue_depth(&self, agent_id: &str) -> Result<u64, RouterError> {
        let mut depth = 0i64;
        for class in PRIORITY_CLASSES {
            depth += self.broker.llen(&keys::ready_queue(agent_id, class.class())).await?;
        }
        Ok(depth.max(0) as u64)
    }

    /// Scores every routable candidate and returns the decision, caching
    /// it for 24h and bumping the chosen agent's per-model counter.
    pub async fn route(&self, task: &Task) -> Result<RoutingDecision, RouterError> {
        let candidates = self.routable_agents();
        if candidates.is_empty() {
            return Err(RouterError::NoCandidates);
        }

        let now = now_ms();
        let mut ranked = Vec::with_capacity(candidates.len());
        for agent in &candidates {
            let stats = self.historical_stats(&agent.id).await?;
            let depth = self.queue_depth(&agent.id).await?;
            let breakdown = score_agent(task, agent, &stats, now, depth);
            ranked.push(Candidate { agent_id: agent.id.clone(), breakdown });
        }
        ranked.sort_by(|a, b| b.breakdown.total().total_cmp(&a.breakdown.total()));

        let decision = build_decision(&task.id, &ranked, now);
        let model = candidates
            .iter()
            .find(|a| a.id == decision.primary_agent)
            .map(|a| a.model.clone())
            .unwrap_or_else(|| decision.primary_agent.clone());
        self.cache.store(&decision, &model).await?;
        debug!(task_id = %task.id, primary = %decision.primary_agent, score = decision.score, "routed task");
        Ok(decision)
    }

    pub async fn cached_decision(&self, task_id: &str) -> Result<Option<RoutingDecision>, RouterError> {
        self.cache.get(task_id).await
    }
}

/// Implements the hooks crate's dependency-inversion seam: the
/// `predictive-task-router` hook wraps this and calls `advise` before
/// assignment rather than depending on this crate directly.
#[async_trait]
impl RoutingAdvisor for Router {
    async fn advise(&self, ctx: &HookContext) -> RoutingAdvice {
        match self.route(&ctx.task).await {
            Ok(decision) => RoutingAdvice { preferred_agent: Some(decision.primary_agent), reroute_target: None },
            Err(err) => {
                debug!(error = %err, "routing advisor could not produce a decision");
                RoutingAdvice::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;

    fn agent(id: &str, load: f64, capabilities: &[&str]) -> Agent {
        let mut a = Agent::new(id, id).with_capabilities(capabilities.iter().map(|s| s.to_string()));
        a.status = AgentStatus::Active;
        a.set_load(load);
        a
    }

    #[tokio::test]
    async fn picks_strongest_capability_match() {
        let router = Router::new(Arc::new(InMemoryBroker::new()));
        router.register_agent(agent("claude", 0.1, &["architecture"]));
        router.register_agent(agent("deepseek", 0.9, &["testing"]));

        let task = Task::new(None, Some("architecture".into()), "design the schema".into(), Priority::Normal, 3).unwrap();
        let decision = router.route(&task).await.unwrap();
        assert_eq!(decision.primary_agent, "claude");
        assert!(decision.reason.contains("strong capability match"));
        // ranked is sorted descending by total score, so claude leading
        // deepseek into fallbacks is exactly score(claude) > score(deepseek).
        assert_eq!(decision.fallbacks, vec!["deepseek".to_string()]);
    }

    #[tokio::test]
    async fn no_routable_agents_errors() {
        let router = Router::new(Arc::new(InMemoryBroker::new()));
        let task = Task::new(None, None, "x".into(), Priority::Normal, 1).unwrap();
        assert!(matches!(router.route(&task).await, Err(RouterError::NoCandidates)));
    }

    #[tokio::test]
    async fn working_agents_are_excluded_as_candidates() {
        let router = Router::new(Arc::new(InMemoryBroker::new()));
        let mut busy = agent("claude", 0.1, &["architecture"]);
        busy.status = AgentStatus::Working;
        router.register_agent(busy);
        let task = Task::new(None, None, "x".into(), Priority::Normal, 1).unwrap();
        assert!(router.route(&task).await.is_err());
    }
}
