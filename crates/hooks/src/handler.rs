use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use orchestrator_core::{ContextModifications, HookViolation};

use crate::context::HookContext;
use crate::descriptor::HookDescriptor;

/// What a hook decided about whether the task should proceed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookDecision {
    Allow,
    Block { reason: String, violations: Vec<HookViolation> },
    Reroute { target: String },
}

impl HookDecision {
    pub fn is_block(&self) -> bool {
        matches!(self, HookDecision::Block { .. })
    }
}

/// What running a hook produced: side-effects to merge into the task,
/// whether to halt the remainder of a sequential chain, and an optional
/// opaque result payload recorded alongside the execution history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookOutcome {
    pub context_modifications: ContextModifications,
    pub stop_chain: bool,
    pub result: Option<serde_json::Value>,
}

/// The capability interface every hook implementation exposes, per the
/// hub-and-spoke dispatch model: hooks never reference each other
/// directly, only through ids the registry resolves.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn descriptor(&self) -> HookDescriptor;

    /// Cheap veto check, run before `execute`. Default: always allow.
    async fn validate(&self, _ctx: &HookContext) -> HookDecision {
        HookDecision::Allow
    }

    async fn execute(&self, ctx: &mut HookContext) -> HookOutcome;
}

/// Tagged-variant view over a registered hook, used for introspection and
/// admin surfacing without downcasting the trait object.
#[derive(Clone)]
pub enum HookKind {
    SafetyGate(Arc<dyn HookHandler>),
    Router(Arc<dyn HookHandler>),
    Logger(Arc<dyn HookHandler>),
    Custom(Arc<dyn HookHandler>),
}

impl HookKind {
    pub fn handler(&self) -> Arc<dyn HookHandler> {
        match self {
            HookKind::SafetyGate(h) | HookKind::Router(h) | HookKind::Logger(h) | HookKind::Custom(h) => Arc::clone(h),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HookKind::SafetyGate(_) => "safety_gate",
            HookKind::Router(_) => "router",
            HookKind::Logger(_) => "logger",
            HookKind::Custom(_) => "custom",
        }
    }
}
