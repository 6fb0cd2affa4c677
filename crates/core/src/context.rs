//! The execution-context envelope threaded through the hook pipeline and
//! the agent runtime's task cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Agent, Priority, Task};

/// A point-in-time view of system load, passed to hooks so routing and
/// safety decisions can see more than just the task at hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub active_agents: usize,
    pub total_queue_depth: usize,
}

/// Mutable record of what happened during this task's execution attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFrame {
    pub started_at_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Accumulated side-effects a hook chain asks the caller to apply to the
/// task once the chain completes.
///
/// A hook may request a preferred-agent override, a priority change
/// (subject to the never-lower invariant — see [`Task::raise_priority`]),
/// and metadata to merge in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextModifications {
    pub preferred_agent: Option<String>,
    pub priority: Option<Priority>,
    pub metadata: HashMap<String, String>,
}

impl ContextModifications {
    pub fn merge(&mut self, other: ContextModifications) {
        if other.preferred_agent.is_some() {
            self.preferred_agent = other.preferred_agent;
        }
        if other.priority.is_some() {
            self.priority = other.priority;
        }
        self.metadata.extend(other.metadata);
    }

    pub fn is_empty(&self) -> bool {
        self.preferred_agent.is_none() && self.priority.is_none() && self.metadata.is_empty()
    }
}

/// The envelope passed to every hook invocation: the candidate/assigned
/// agent, the task, a system load snapshot, the in-flight execution frame,
/// an opaque shared map hooks can use to pass data to one another in
/// sequential chains, and the accumulated modifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub agent: Option<Agent>,
    pub task: Task,
    pub system: SystemSnapshot,
    pub execution: ExecutionFrame,
    pub shared: HashMap<String, serde_json::Value>,
    pub modifications: ContextModifications,
}

impl ExecutionContext {
    pub fn new(task: Task) -> Self {
        Self {
            agent: None,
            task,
            system: SystemSnapshot::default(),
            execution: ExecutionFrame::default(),
            shared: HashMap::new(),
            modifications: ContextModifications::default(),
        }
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_system(mut self, system: SystemSnapshot) -> Self {
        self.system = system;
        self
    }

    /// Applies any accumulated modifications to the wrapped task. Priority
    /// changes go through [`Task::raise_priority`], so they can never
    /// lower the task's priority.
    pub fn apply_modifications(&mut self) {
        let modifications = std::mem::take(&mut self.modifications);
        if let Some(agent_id) = modifications.preferred_agent {
            self.task.preferred_agent = Some(agent_id);
        }
        if let Some(priority) = modifications.priority {
            self.task.raise_priority(priority);
        }
        if !modifications.metadata.is_empty() {
            self.task.metadata.extend(modifications.metadata);
        }
        self.task.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    fn task() -> Task {
        Task::new(Some("t1".into()), None, "hi".into(), Priority::Normal, 1).unwrap()
    }

    #[test]
    fn apply_modifications_raises_but_never_lowers_priority() {
        let mut ctx = ExecutionContext::new(task());
        ctx.task.priority = Priority::High;
        ctx.modifications.priority = Some(Priority::Low);
        ctx.apply_modifications();
        assert_eq!(ctx.task.priority, Priority::High);
    }

    #[test]
    fn apply_modifications_merges_metadata_and_agent() {
        let mut ctx = ExecutionContext::new(task());
        ctx.modifications.preferred_agent = Some("agent-1".into());
        ctx.modifications
            .metadata
            .insert("key".into(), "value".into());
        ctx.apply_modifications();
        assert_eq!(ctx.task.preferred_agent.as_deref(), Some("agent-1"));
        assert_eq!(ctx.task.metadata.get("key").map(String::as_str), Some("value"));
    }
}
