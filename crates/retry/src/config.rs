use std::time::Duration;

/// Tunables for the retry engine. Defaults match the error-class table's
/// base/ceiling figures; per-class `max_attempts` still comes from
/// [`crate::classification::policy_for`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub processing_interval: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
    pub dlq_ttl: Duration,
    pub dlq_housekeeping_interval: Duration,
    pub pattern_analysis_interval: Duration,
    pub pattern_min_attempts: u32,
    pub pattern_min_successes: u32,
    pub pattern_low_success_rate: f64,
    pub pattern_slow_recovery: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5 * 60),
            processing_interval: Duration::from_secs(5),
            circuit_breaker_threshold: 10,
            circuit_breaker_cooldown: Duration::from_secs(5 * 60),
            dlq_ttl: Duration::from_secs(24 * 3600),
            dlq_housekeeping_interval: Duration::from_secs(5 * 60),
            pattern_analysis_interval: Duration::from_secs(10 * 60),
            pattern_min_attempts: 10,
            pattern_min_successes: 5,
            pattern_low_success_rate: 0.3,
            pattern_slow_recovery: Duration::from_secs(5 * 60),
        }
    }
}
