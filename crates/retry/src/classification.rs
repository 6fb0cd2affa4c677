use orchestrator_core::ErrorClass;
use regex::Regex;
use std::sync::OnceLock;

use crate::strategy::DelayStrategy;

/// Per-class retry policy: delay strategy and max attempts before DLQ.
/// Recoverability itself lives on `ErrorClass::recoverable` in the core
/// crate since every crate needs it, not just the retry engine.
#[derive(Debug, Clone, Copy)]
pub struct ClassPolicy {
    pub strategy: DelayStrategy,
    pub max_attempts: u32,
}

/// The error-class table: strategy and max attempts.
pub fn policy_for(class: ErrorClass) -> ClassPolicy {
    match class {
        ErrorClass::RateLimit => ClassPolicy { strategy: DelayStrategy::Exponential, max_attempts: 10 },
        ErrorClass::Timeout => ClassPolicy { strategy: DelayStrategy::Linear, max_attempts: 5 },
        ErrorClass::Connection => ClassPolicy { strategy: DelayStrategy::Exponential, max_attempts: 7 },
        ErrorClass::ParseError => ClassPolicy { strategy: DelayStrategy::Immediate, max_attempts: 2 },
        ErrorClass::MemoryLimit => ClassPolicy { strategy: DelayStrategy::Adaptive, max_attempts: 3 },
        ErrorClass::Authentication => ClassPolicy { strategy: DelayStrategy::Immediate, max_attempts: 1 },
        ErrorClass::Permission => ClassPolicy { strategy: DelayStrategy::Immediate, max_attempts: 1 },
        ErrorClass::Validation => ClassPolicy { strategy: DelayStrategy::Immediate, max_attempts: 2 },
        ErrorClass::Unknown => ClassPolicy { strategy: DelayStrategy::Exponential, max_attempts: 3 },
    }
}

struct Patterns {
    rate_limit: Regex,
    timeout: Regex,
    connection: Regex,
    parse_error: Regex,
    memory_limit: Regex,
    authentication: Regex,
    permission: Regex,
    validation: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        rate_limit: Regex::new(r"(?i)rate[\s_-]?limit|429|too many requests").unwrap(),
        timeout: Regex::new(r"(?i)timed?\s*out|timeout|deadline exceeded").unwrap(),
        connection: Regex::new(r"(?i)connection (refused|reset|closed)|could not connect|network (error|unreachable)|broken pipe").unwrap(),
        parse_error: Regex::new(r"(?i)parse error|invalid json|malformed|unexpected token|syntax error").unwrap(),
        memory_limit: Regex::new(r"(?i)out of memory|memory limit|oom|allocation failed").unwrap(),
        authentication: Regex::new(r"(?i)401|unauthorized|invalid (api[\s_-]?key|credentials|token)|authentication failed").unwrap(),
        permission: Regex::new(r"(?i)403|forbidden|permission denied|access denied").unwrap(),
        validation: Regex::new(r"(?i)validation (error|failed)|invalid (input|argument|parameter)|400 bad request").unwrap(),
    })
}

/// Classifies an error message into one of the nine taxonomy classes by
/// case-insensitive pattern matching, falling back to `Unknown`.
pub fn classify(error_message: &str) -> ErrorClass {
    let p = patterns();
    if p.rate_limit.is_match(error_message) {
        ErrorClass::RateLimit
    } else if p.authentication.is_match(error_message) {
        ErrorClass::Authentication
    } else if p.permission.is_match(error_message) {
        ErrorClass::Permission
    } else if p.timeout.is_match(error_message) {
        ErrorClass::Timeout
    } else if p.connection.is_match(error_message) {
        ErrorClass::Connection
    } else if p.memory_limit.is_match(error_message) {
        ErrorClass::MemoryLimit
    } else if p.parse_error.is_match(error_message) {
        ErrorClass::ParseError
    } else if p.validation.is_match(error_message) {
        ErrorClass::Validation
    } else {
        ErrorClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_messages() {
        assert_eq!(classify("429 rate limit exceeded"), ErrorClass::RateLimit);
        assert_eq!(classify("request timed out after 30s"), ErrorClass::Timeout);
        assert_eq!(classify("connection refused by host"), ErrorClass::Connection);
        assert_eq!(classify("401 unauthorized"), ErrorClass::Authentication);
        assert_eq!(classify("403 forbidden"), ErrorClass::Permission);
        assert_eq!(classify("invalid json: unexpected token"), ErrorClass::ParseError);
        assert_eq!(classify("out of memory"), ErrorClass::MemoryLimit);
        assert_eq!(classify("validation failed: missing field"), ErrorClass::Validation);
        assert_eq!(classify("something unexpected happened"), ErrorClass::Unknown);
    }

    #[test]
    fn policy_table_matches_error_class_table() {
        assert_eq!(policy_for(ErrorClass::RateLimit).max_attempts, 10);
        assert_eq!(policy_for(ErrorClass::Timeout).max_attempts, 5);
        assert_eq!(policy_for(ErrorClass::Connection).max_attempts, 7);
        assert_eq!(policy_for(ErrorClass::ParseError).max_attempts, 2);
        assert_eq!(policy_for(ErrorClass::MemoryLimit).max_attempts, 3);
        assert_eq!(policy_for(ErrorClass::Authentication).max_attempts, 1);
        assert_eq!(policy_for(ErrorClass::Permission).max_attempts, 1);
        assert_eq!(policy_for(ErrorClass::Validation).max_attempts, 2);
        assert_eq!(policy_for(ErrorClass::Unknown).max_attempts, 3);
        assert!(!ErrorClass::ParseError.recoverable());
        assert!(ErrorClass::Unknown.recoverable());
    }
}
