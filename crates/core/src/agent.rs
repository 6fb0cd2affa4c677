//! The [`Agent`] data model — a long-lived worker wrapping one model
//! provider.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Idle,
    Working,
    Error,
}

impl AgentStatus {
    /// Only `Active`/`Idle` agents are eligible routing candidates.
    pub fn is_routable(self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::Idle)
    }
}

/// A long-lived worker bound to one model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    /// Identifier of the backing model (e.g. `"claude-3-opus"`).
    pub model: String,
    pub capabilities: HashSet<String>,
    pub status: AgentStatus,
    /// Current load, clamped to `0.0..=1.0`.
    pub load: f64,
    /// Wall-clock ms of the last heartbeat refresh.
    pub last_heartbeat_ms: u64,
    /// Rough token budget this agent's model supports per request.
    pub token_limit: usize,
    /// Cost in USD per token, used by the router's cost scoring band.
    pub cost_per_token: f64,
}

impl Agent {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            capabilities: HashSet::new(),
            status: AgentStatus::Idle,
            load: 0.0,
            last_heartbeat_ms: 0,
            token_limit: 8192,
            cost_per_token: 0.0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = String>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn set_load(&mut self, load: f64) {
        self.load = load.clamp(0.0, 1.0);
    }

    pub fn heartbeat(&mut self, now_ms: u64) {
        self.last_heartbeat_ms = now_ms;
        if self.status == AgentStatus::Error {
            self.status = AgentStatus::Idle;
        }
    }

    /// Whether this agent's heartbeat is fresh within `window_ms` of `now_ms`.
    pub fn heartbeat_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) <= window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routable_statuses() {
        assert!(AgentStatus::Active.is_routable());
        assert!(AgentStatus::Idle.is_routable());
        assert!(!AgentStatus::Working.is_routable());
        assert!(!AgentStatus::Error.is_routable());
    }

    #[test]
    fn load_clamped() {
        let mut agent = Agent::new("a1", "claude");
        agent.set_load(1.5);
        assert_eq!(agent.load, 1.0);
        agent.set_load(-0.5);
        assert_eq!(agent.load, 0.0);
    }

    #[test]
    fn heartbeat_clears_error() {
        let mut agent = Agent::new("a1", "claude");
        agent.status = AgentStatus::Error;
        agent.heartbeat(1_000);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.heartbeat_fresh(1_500, 1_000));
        assert!(!agent.heartbeat_fresh(5_000, 1_000));
    }
}
