//! Pluggable pre/post-execution hook pipeline: a static registry
//! populated at program start, a parallel/sequential executor, named
//! chains, and the built-in safety/routing-advice/logging hooks.

pub mod builtin;
pub mod chain;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod handler;
pub mod record;
pub mod registry;

pub use builtin::{LoggingHook, PredictiveRouterHook, ResourceBudget, RoutingAdvice, RoutingAdvisor, SafetyHook};
pub use chain::{Chain, ChainMode, ChainRegistry, ChainStepConfig};
pub use context::HookContext;
pub use descriptor::{HookDescriptor, HookType};
pub use error::HookError;
pub use executor::HookExecutor;
pub use handler::{HookDecision, HookHandler, HookKind, HookOutcome};
pub use record::{ExecutionHistory, ExecutionResult, HookTypeMetrics, PerHookResult};
pub use registry::HookRegistry;
