use std::sync::Arc;

use orchestrator_broker::memory::InMemoryBroker;
use orchestrator_broker::Broker;
use orchestrator_core::{Agent, AgentStatus, Priority, Task};
use orchestrator_hooks::{HookContext, HookHandler, PredictiveRouterHook};
use orchestrator_router::Router;

fn agent(id: &str, capability: &str, load: f64) -> Agent {
    let mut a = Agent::new(id, id).with_capabilities([capability.to_string()]);
    a.status = AgentStatus::Active;
    a.set_load(load);
    a
}

#[tokio::test]
async fn predictive_router_hook_sets_preferred_agent_from_live_routing() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let router = Arc::new(Router::new(broker));
    router.register_agent(agent("claude-1", "architecture", 0.1));
    router.register_agent(agent("deepseek-1", "testing", 0.2));

    let hook = PredictiveRouterHook::new(router.clone());
    let task = Task::new(None, Some("architecture".into()), "design the schema".into(), Priority::Normal, 4).unwrap();
    let mut ctx = HookContext::new(task);

    let outcome = hook.execute(&mut ctx).await;

    assert_eq!(outcome.context_modifications.preferred_agent.as_deref(), Some("claude-1"));
    assert!(!outcome.stop_chain);
}

#[tokio::test]
async fn predictive_router_hook_falls_back_to_no_advice_without_candidates() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let router = Arc::new(Router::new(broker));
    let hook = PredictiveRouterHook::new(router);

    let task = Task::new(None, None, "do a thing".into(), Priority::Normal, 1).unwrap();
    let mut ctx = HookContext::new(task);
    let outcome = hook.execute(&mut ctx).await;

    assert!(outcome.context_modifications.preferred_agent.is_none());
}
