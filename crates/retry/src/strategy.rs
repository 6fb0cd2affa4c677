use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The delay strategy attached to an error class via [`crate::classification::policy_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayStrategy {
    Exponential,
    Linear,
    Immediate,
    Adaptive,
}

/// Failure-pattern signal consulted by the `Adaptive` strategy. Produced by
/// [`crate::pattern_analyzer::PatternAnalyzer`]; `None` when no pattern has
/// accumulated enough samples yet, in which case adaptive falls back to
/// plain exponential.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveHint {
    pub success_rate: f64,
    pub avg_recovery_time: Duration,
}

fn jitter(base: Duration) -> Duration {
    let pct = rand::thread_rng().gen_range(0.0..0.10);
    base + Duration::from_secs_f64(base.as_secs_f64() * pct)
}

/// Computes the delay before the next retry attempt, 1-based `attempt`
/// being the attempt that just failed (so `attempt == 1` is the delay
/// before the second try).
pub fn compute_delay(
    strategy: DelayStrategy,
    attempt: u32,
    base: Duration,
    max: Duration,
    hint: Option<AdaptiveHint>,
) -> Duration {
    let raw = match strategy {
        DelayStrategy::Exponential => {
            let factor = 2f64.powi((attempt.max(1) - 1) as i32);
            jitter(Duration::from_secs_f64(base.as_secs_f64() * factor))
        }
        DelayStrategy::Linear => jitter(Duration::from_secs_f64(base.as_secs_f64() * attempt.max(1) as f64)),
        DelayStrategy::Immediate => Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0)),
        DelayStrategy::Adaptive => match hint {
            Some(h) if h.success_rate < 0.5 => {
                let factor = 2f64.powi((attempt.max(1) - 1) as i32);
                jitter(Duration::from_secs_f64(base.as_secs_f64() * factor * 2.0))
            }
            Some(h) => jitter(Duration::from_secs_f64(h.avg_recovery_time.as_secs_f64() * 1.5)),
            None => {
                let factor = 2f64.powi((attempt.max(1) - 1) as i32);
                jitter(Duration::from_secs_f64(base.as_secs_f64() * factor))
            }
        },
    };
    raw.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_grows_and_respects_cap() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        let d1 = compute_delay(DelayStrategy::Exponential, 1, base, max, None);
        let d3 = compute_delay(DelayStrategy::Exponential, 3, base, max, None);
        assert!(d1.as_secs_f64() >= 1.0 && d1.as_secs_f64() < 1.2);
        assert!(d3 > d1);
        let d10 = compute_delay(DelayStrategy::Exponential, 10, base, max, None);
        assert!(d10 <= max);
    }

    #[test]
    fn immediate_is_always_sub_second() {
        let d = compute_delay(DelayStrategy::Immediate, 1, Duration::from_secs(1), Duration::from_secs(5), None);
        assert!(d < Duration::from_secs(1));
    }

    #[test]
    fn adaptive_doubles_when_pattern_is_failing() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        let without_hint = compute_delay(DelayStrategy::Adaptive, 2, base, max, None);
        let failing_hint = AdaptiveHint { success_rate: 0.2, avg_recovery_time: Duration::from_secs(10) };
        let with_hint = compute_delay(DelayStrategy::Adaptive, 2, base, max, Some(failing_hint));
        assert!(with_hint.as_secs_f64() > without_hint.as_secs_f64() * 1.5);
    }

    #[test]
    fn adaptive_uses_recovery_time_when_pattern_is_healthy() {
        let hint = AdaptiveHint { success_rate: 0.9, avg_recovery_time: Duration::from_secs(20) };
        let d = compute_delay(DelayStrategy::Adaptive, 1, Duration::from_secs(1), Duration::from_secs(300), Some(hint));
        assert!(d.as_secs_f64() >= 30.0 && d.as_secs_f64() < 33.0);
    }
}
