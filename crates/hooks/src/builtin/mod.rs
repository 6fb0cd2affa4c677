pub mod logging;
pub mod router_advisor;
pub mod safety;

pub use logging::LoggingHook;
pub use router_advisor::{PredictiveRouterHook, RoutingAdvice, RoutingAdvisor};
pub use safety::{ResourceBudget, SafetyHook};

use std::sync::Arc;

use orchestrator_broker::Broker;

use crate::handler::HookKind;
use crate::registry::HookRegistry;

/// Registers the hooks that ship with the core at process start: the
/// safety gate and the post-execution logger. The predictive router hook
/// is registered separately by the binary once the router is built (see
/// [`router_advisor::RoutingAdvisor`] for why it can't live here).
pub fn register_all(registry: &HookRegistry, broker: Arc<dyn Broker>) -> Result<(), crate::error::HookError> {
    registry.register(HookKind::SafetyGate(Arc::new(SafetyHook::new(broker.clone()))))?;
    registry.register(HookKind::Logger(Arc::new(LoggingHook::new(broker))))?;
    Ok(())
}
