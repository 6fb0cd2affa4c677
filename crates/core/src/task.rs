//! The [`Task`] data model — the unit of work routed, retried, and audited
//! by every other crate in this workspace.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::CoreError;

/// Scheduling priority. Ordered so that `Critical > High > Normal > Low >
/// Deferred`; the router and queue fabric rely on this ordering directly.
///
/// A task's priority may be *raised* by the router (e.g. on repeated
/// retry) but is never lowered by any component once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Deferred = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    /// Numeric class used by the queue fabric's score formula
    /// (`priority_class * 10^6 + timestamp_ms`).
    pub fn class(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Deferred => "deferred",
        };
        write!(f, "{s}")
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Metadata attached to a task only once it has failed and is being
/// rescheduled by the retry engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryMetadata {
    /// 1-based attempt number this retry represents.
    pub attempt: u32,
    /// The classified error message from the prior attempt.
    pub original_error: String,
    /// Wall-clock ms when this retry cycle began.
    pub retry_start_ms: u64,
}

/// The unit of work dispatched to an agent.
///
/// `id` is immutable once set (generated with `uuid::Uuid::new_v4` when the
/// caller does not supply one). Every other field may change over the
/// task's lifetime, but each change is expected to be captured as a new
/// logical version in the transaction log — see [`Task::touch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub prompt: String,
    pub priority: Priority,
    /// Subjective complexity estimate, 1 (trivial) to 10 (hardest).
    pub complexity: u8,
    pub preferred_agent: Option<String>,
    pub metadata: HashMap<String, String>,
    pub files: Option<Vec<String>>,
    pub retry_metadata: Option<RetryMetadata>,
    /// Bumped on every logical mutation; the transaction logger uses this to
    /// distinguish a genuine new event from a duplicate delivery.
    pub version: u64,
}

impl Task {
    /// Builds a new task, generating an id when none is supplied and
    /// validating the invariants that must hold at creation time.
    pub fn new(
        id: Option<String>,
        task_type: Option<String>,
        prompt: String,
        priority: Priority,
        complexity: u8,
    ) -> Result<Self, CoreError> {
        if complexity == 0 || complexity > 10 {
            return Err(CoreError::InvalidTask(format!(
                "complexity must be in 1..=10, got {complexity}"
            )));
        }
        if prompt.trim().is_empty() {
            return Err(CoreError::InvalidTask("prompt must not be empty".into()));
        }

        Ok(Self {
            id: id.unwrap_or_else(crate::generate_task_id),
            task_type,
            prompt,
            priority,
            complexity,
            preferred_agent: None,
            metadata: HashMap::new(),
            files: None,
            retry_metadata: None,
            version: 0,
        })
    }

    /// Derives the routing category: the explicit `type` if set, otherwise
    /// `None` (callers fall back to keyword-derived classification — see
    /// `orchestrator-router`).
    pub fn category(&self) -> Option<&str> {
        self.task_type.as_deref()
    }

    /// Raises priority if `new_priority` is strictly higher than the
    /// current one; a no-op otherwise. Priority is never lowered by any
    /// caller, per the data-model invariant.
    pub fn raise_priority(&mut self, new_priority: Priority) {
        if new_priority > self.priority {
            self.priority = new_priority;
            self.touch();
        }
    }

    /// Bumps the logical version. Call after any field mutation that should
    /// be observable as a new event in the transaction log.
    pub fn touch(&mut self) {
        self.version += 1;
    }

    /// Rough token estimate used by the router's capability scoring:
    /// character count divided by four.
    pub fn estimated_tokens(&self) -> usize {
        self.prompt.chars().count() / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert!(Priority::Low > Priority::Deferred);
    }

    #[test]
    fn new_task_generates_id_when_absent() {
        let task = Task::new(None, Some("analysis".into()), "summarize X".into(), Priority::Normal, 3)
            .unwrap();
        assert!(!task.id.is_empty());
    }

    #[test]
    fn new_task_preserves_supplied_id() {
        let task = Task::new(
            Some("t1".into()),
            Some("analysis".into()),
            "summarize X".into(),
            Priority::Normal,
            3,
        )
        .unwrap();
        assert_eq!(task.id, "t1");
    }

    #[test]
    fn raise_priority_never_lowers() {
        let mut task = Task::new(Some("t1".into()), None, "x".into(), Priority::High, 2).unwrap();
        task.raise_priority(Priority::Normal);
        assert_eq!(task.priority, Priority::High);
        task.raise_priority(Priority::Critical);
        assert_eq!(task.priority, Priority::Critical);
    }

    #[test]
    fn rejects_invalid_complexity() {
        assert!(Task::new(None, None, "x".into(), Priority::Normal, 0).is_err());
        assert!(Task::new(None, None, "x".into(), Priority::Normal, 11).is_err());
    }

    #[test]
    fn estimated_tokens_is_char_count_over_four() {
        let task = Task::new(None, None, "a".repeat(40), Priority::Normal, 1).unwrap();
        assert_eq!(task.estimated_tokens(), 10);
    }
}
