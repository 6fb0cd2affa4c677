//! Error classification, backoff strategies, circuit breakers, a
//! dead-letter queue, and failure-pattern analysis, tied together by
//! [`engine::RetryEngine`].

pub mod circuit_breaker;
pub mod classification;
pub mod config;
pub mod dlq;
pub mod engine;
pub mod error;
pub mod pattern_analyzer;
pub mod record;
pub mod strategy;

pub use circuit_breaker::CircuitBreakerRegistry;
pub use classification::{classify, policy_for, ClassPolicy};
pub use config::RetryConfig;
pub use dlq::{DeadLetterQueue, DeadLetterRecord};
pub use engine::{retry_enqueue_score, RetryEngine};
pub use error::RetryError;
pub use pattern_analyzer::{PatternAnalyzer, PatternNotification, PatternStats};
pub use record::{RetryOutcome, RetryRecord};
pub use strategy::{compute_delay, AdaptiveHint, DelayStrategy};
