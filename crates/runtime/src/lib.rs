//! Per-agent task cycle: queue fabric primitives (ready/in-flight lists,
//! orphan recovery), the model-client boundary, and the runtime loop that
//! ties dequeue, hooks, model dispatch, and retry hand-off together.

pub mod agent_runtime;
pub mod error;
pub mod events;
pub mod model_client;
pub mod queue_fabric;
pub mod task_store;

pub use agent_runtime::{AgentRuntime, AgentRuntimeConfig, CycleOutcome};
pub use error::RuntimeError;
pub use model_client::{ModelClient, ModelResult, NullModelClient, SimulatedModelClient};
pub use queue_fabric::{QueueFabric, PRIORITY_CLASSES_DESC};
pub use task_store::{TaskInfo, TaskStatus, TaskStore};
