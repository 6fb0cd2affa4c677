use std::sync::Arc;

use orchestrator_broker::{Broker, InMemoryBroker};
use orchestrator_core::{Priority, Task};
use orchestrator_platform::{PlatformConfig, PlatformContext};
use tokio_util::sync::CancellationToken;

fn test_config() -> PlatformConfig {
    let mut config = PlatformConfig::default();
    config.agents.insert(
        "claude".to_string(),
        orchestrator_platform::platform::config::AgentSettings {
            model: "claude-3-opus".to_string(),
            capabilities: vec!["architecture".to_string()],
            token_limit: 100_000,
            cost_per_token: 0.00001,
        },
    );
    config
}

#[tokio::test]
async fn enqueued_task_is_routed_and_queryable() {
    let config = test_config();
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let ctx = PlatformContext::new(config, broker, CancellationToken::new()).unwrap();

    let task = Task::new(Some("t-1".into()), Some("architecture".into()), "design a schema".into(), Priority::Normal, 4).unwrap();
    let decision = ctx.router().route(&task).await.unwrap();
    assert_eq!(decision.primary_agent, "claude");

    ctx.queue_fabric().enqueue(&task, &decision.primary_agent).await.unwrap();
    let info = ctx.queue_fabric().store().get("t-1").await.unwrap().expect("task recorded");
    assert_eq!(info.status, "queued");
    assert_eq!(info.agent_id.as_deref(), Some("claude"));
}

#[tokio::test]
async fn built_in_hooks_are_registered_and_toggleable() {
    let config = test_config();
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let ctx = PlatformContext::new(config, broker, CancellationToken::new()).unwrap();
    orchestrator_hooks::builtin::register_all(&ctx.hook_registry(), ctx.broker()).unwrap();

    let ids: Vec<String> = ctx.hook_registry().list().into_iter().map(|d| d.id).collect();
    assert!(ids.contains(&"pre-execution-safety".to_string()));
    assert!(ids.contains(&"post-execution-logging".to_string()));

    ctx.hook_registry().broadcast_change("pre-execution-safety", false).await.unwrap();
    let descriptor = ctx.hook_registry().descriptor("pre-execution-safety").unwrap();
    assert!(!descriptor.enabled);
}
