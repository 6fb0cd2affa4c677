use std::collections::HashMap;
use std::sync::Arc;

use orchestrator_broker::{keys, Broker};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::descriptor::{HookDescriptor, HookType};
use crate::error::HookError;
use crate::handler::{HookHandler, HookKind};

struct Entry {
    kind: HookKind,
    descriptor: RwLock<HookDescriptor>,
}

/// Static, program-start hook registry: hooks are added once via
/// [`HookRegistry::register`] (typically from `builtin::register_all`),
/// never discovered by scanning a directory. Enable/disable changes are
/// broadcast over the broker so peer processes stay in sync.
pub struct HookRegistry {
    broker: Arc<dyn Broker>,
    entries: RwLock<HashMap<String, Entry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HookChangedEvent {
    hook_id: String,
    enabled: bool,
}

impl HookRegistry {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: HookKind) -> Result<(), HookError> {
        let descriptor = kind.handler().descriptor();
        let id = descriptor.id.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(HookError::AlreadyRegistered(id));
        }
        info!(hook_id = %id, kind = kind.label(), "registered hook");
        entries.insert(
            id,
            Entry {
                kind,
                descriptor: RwLock::new(descriptor),
            },
        );
        Ok(())
    }

    pub fn descriptor(&self, id: &str) -> Option<HookDescriptor> {
        self.entries.read().get(id).map(|e| e.descriptor.read().clone())
    }

    pub fn list(&self) -> Vec<HookDescriptor> {
        self.entries.read().values().map(|e| e.descriptor.read().clone()).collect()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), HookError> {
        let entries = self.entries.read();
        let entry = entries.get(id).ok_or_else(|| HookError::NotFound(id.to_string()))?;
        entry.descriptor.write().enabled = enabled;
        Ok(())
    }

    /// Publishes the enable/disable change so peer processes sharing the
    /// same broker converge without a restart.
    pub async fn broadcast_change(&self, id: &str, enabled: bool) -> Result<(), HookError> {
        self.set_enabled(id, enabled)?;
        let payload = serde_json::to_string(&HookChangedEvent {
            hook_id: id.to_string(),
            enabled,
        })?;
        self.broker.publish(keys::CHANNEL_HOOK_CONFIG_CHANGED, payload).await?;
        Ok(())
    }

    /// Enabled hooks of the given type, sorted by descending priority.
    pub fn hooks_for_type(&self, hook_type: &HookType) -> Vec<(HookDescriptor, Arc<dyn HookHandler>)> {
        let entries = self.entries.read();
        let mut matches: Vec<(HookDescriptor, Arc<dyn HookHandler>)> = entries
            .values()
            .filter_map(|entry| {
                let descriptor = entry.descriptor.read().clone();
                if &descriptor.hook_type == hook_type && descriptor.enabled {
                    Some((descriptor, entry.kind.handler()))
                } else {
                    None
                }
            })
            .collect();
        matches.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HookContext;
    use crate::handler::{HookDecision, HookOutcome};
    use async_trait::async_trait;
    use orchestrator_broker::InMemoryBroker;
    use orchestrator_core::{Priority, Task};

    struct NoopHook(HookDescriptor);

    #[async_trait]
    impl HookHandler for NoopHook {
        fn descriptor(&self) -> HookDescriptor {
            self.0.clone()
        }

        async fn execute(&self, _ctx: &mut HookContext) -> HookOutcome {
            HookOutcome::default()
        }
    }

    fn ctx() -> HookContext {
        HookContext::new(Task::new(Some("t1".into()), None, "hi".into(), Priority::Normal, 1).unwrap())
    }

    #[test]
    fn hooks_for_type_sorts_by_descending_priority() {
        let registry = HookRegistry::new(Arc::new(InMemoryBroker::new()));
        registry
            .register(HookKind::Custom(Arc::new(NoopHook(HookDescriptor::new(
                "low",
                "low",
                HookType::PreTask,
                10,
            )))))
            .unwrap();
        registry
            .register(HookKind::SafetyGate(Arc::new(NoopHook(HookDescriptor::new(
                "high",
                "high",
                HookType::PreTask,
                100,
            )))))
            .unwrap();

        let ordered = registry.hooks_for_type(&HookType::PreTask);
        assert_eq!(ordered[0].0.id, "high");
        assert_eq!(ordered[1].0.id, "low");
    }

    #[tokio::test]
    async fn disabled_hooks_are_excluded() {
        let registry = HookRegistry::new(Arc::new(InMemoryBroker::new()));
        registry
            .register(HookKind::Custom(Arc::new(NoopHook(HookDescriptor::new(
                "h1",
                "h1",
                HookType::PostTask,
                1,
            )))))
            .unwrap();
        registry.broadcast_change("h1", false).await.unwrap();
        assert!(registry.hooks_for_type(&HookType::PostTask).is_empty());
        let _ = ctx();
    }
}
