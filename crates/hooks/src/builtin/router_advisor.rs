use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HookContext;
use crate::descriptor::{HookDescriptor, HookType};
use crate::handler::{HookHandler, HookOutcome};

/// Routing advice returned by whatever implements [`RoutingAdvisor`].
#[derive(Debug, Clone, Default)]
pub struct RoutingAdvice {
    pub preferred_agent: Option<String>,
    pub reroute_target: Option<String>,
}

/// The routing logic lives in `orchestrator-router`, which sits *after*
/// `orchestrator-hooks` in the dependency order — so this hook can't
/// depend on the router crate directly without a cycle. Instead it
/// depends on this trait; the router crate implements it for its
/// `Router` type, and the binary wires a `PredictiveRouterHook` wrapping
/// that implementation into the registry at startup.
#[async_trait]
pub trait RoutingAdvisor: Send + Sync {
    async fn advise(&self, ctx: &HookContext) -> RoutingAdvice;
}

/// Lets the binary hand an `Arc<Router>` straight to `PredictiveRouterHook`
/// without a wrapper newtype.
#[async_trait]
impl<A: RoutingAdvisor + ?Sized> RoutingAdvisor for Arc<A> {
    async fn advise(&self, ctx: &HookContext) -> RoutingAdvice {
        (**self).advise(ctx).await
    }
}

pub struct PredictiveRouterHook<A: RoutingAdvisor + 'static> {
    descriptor: HookDescriptor,
    advisor: A,
}

impl<A: RoutingAdvisor + 'static> PredictiveRouterHook<A> {
    pub fn new(advisor: A) -> Self {
        Self {
            descriptor: HookDescriptor::new(
                "predictive-task-router",
                "predictive-task-router",
                HookType::PreTaskAssignment,
                95,
            )
            .with_description("scores candidate agents and recommends a preferred agent before assignment"),
            advisor,
        }
    }
}

#[async_trait]
impl<A: RoutingAdvisor + 'static> HookHandler for PredictiveRouterHook<A> {
    fn descriptor(&self) -> HookDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, ctx: &mut HookContext) -> HookOutcome {
        let advice = self.advisor.advise(ctx).await;
        if let Some(target) = advice.reroute_target {
            return HookOutcome {
                context_modifications: Default::default(),
                stop_chain: false,
                result: Some(serde_json::json!({ "action": "reroute", "target": target })),
            };
        }
        let mut modifications = orchestrator_core::ContextModifications::default();
        modifications.preferred_agent = advice.preferred_agent;
        HookOutcome {
            context_modifications: modifications,
            stop_chain: false,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::{Priority, Task};

    struct StaticAdvisor(String);

    #[async_trait]
    impl RoutingAdvisor for StaticAdvisor {
        async fn advise(&self, _ctx: &HookContext) -> RoutingAdvice {
            RoutingAdvice {
                preferred_agent: Some(self.0.clone()),
                reroute_target: None,
            }
        }
    }

    #[tokio::test]
    async fn wraps_advisor_preferred_agent_into_modifications() {
        let hook = PredictiveRouterHook::new(StaticAdvisor("agent-a".into()));
        let mut ctx = HookContext::new(Task::new(Some("t1".into()), None, "x".into(), Priority::Normal, 1).unwrap());
        let outcome = hook.execute(&mut ctx).await;
        assert_eq!(outcome.context_modifications.preferred_agent.as_deref(), Some("agent-a"));
    }
}
