//! Error taxonomy shared by every crate in the workspace.
//!
//! Recoverable task failures never surface as a Rust `Err` from the public
//! enqueue API —
//! they are absorbed into the retry/DLQ flow and only observable through
//! events or queries. [`CoreError`] below covers only the failures that
//! *are* appropriate to return synchronously: malformed inputs and
//! configuration problems detected at construction time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised constructing or mutating core data-model types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("invalid agent: {0}")]
    InvalidAgent(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Classification of a task-execution failure.
///
/// This is the taxonomy the retry engine, safety hook, and analytics
/// surfaces key off of. The classification itself (pattern-matching an
/// error message into one of these variants) lives in `orchestrator-retry`
/// since it's an operation, not data; the variants themselves are shared
/// data referenced across crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    Connection,
    ParseError,
    MemoryLimit,
    Authentication,
    Permission,
    Validation,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Connection => "connection",
            ErrorClass::ParseError => "parse_error",
            ErrorClass::MemoryLimit => "memory_limit",
            ErrorClass::Authentication => "authentication",
            ErrorClass::Permission => "permission",
            ErrorClass::Validation => "validation",
            ErrorClass::Unknown => "unknown",
        }
    }

    /// Whether this class of failure is ever worth retrying. Non-recoverable
    /// classes go straight to the dead-letter queue on first failure.
    pub fn recoverable(self) -> bool {
        !matches!(
            self,
            ErrorClass::ParseError
                | ErrorClass::Authentication
                | ErrorClass::Permission
                | ErrorClass::Validation
        )
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured violation raised by a safety/validation hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookViolation {
    pub violation_type: String,
    pub category: String,
    pub matched_pattern: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_matches_error_class_table() {
        assert!(ErrorClass::RateLimit.recoverable());
        assert!(ErrorClass::Timeout.recoverable());
        assert!(ErrorClass::Connection.recoverable());
        assert!(!ErrorClass::ParseError.recoverable());
        assert!(ErrorClass::MemoryLimit.recoverable());
        assert!(!ErrorClass::Authentication.recoverable());
        assert!(!ErrorClass::Permission.recoverable());
        assert!(!ErrorClass::Validation.recoverable());
        assert!(ErrorClass::Unknown.recoverable());
    }
}
