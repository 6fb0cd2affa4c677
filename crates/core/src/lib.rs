//! Shared data model, error taxonomy, and execution-context envelope for
//! the orchestrator core.
//!
//! This is the lowest layer in the dependency order (broker client →
//! context/error types → transaction logger → hook registry → hook
//! executor → retry engine → router → agent runtime): every other crate in
//! the workspace depends on this one, and this one depends on nothing but
//! `serde`/`uuid`/`chrono`/`thiserror`.

pub mod agent;
pub mod context;
pub mod error;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use context::{ContextModifications, ExecutionContext, ExecutionFrame, SystemSnapshot};
pub use error::{CoreError, ErrorClass, HookViolation};
pub use task::{Priority, RetryMetadata, Task};

/// Generates a fresh task id. Centralized so callers don't need a direct
/// `uuid` dependency just to mint ids consistent with [`Task::new`].
pub fn generate_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
