use orchestrator_core::{Agent, Task};
use serde::{Deserialize, Serialize};

use crate::category::derive_category;

/// Per-agent recovery/performance tallies the router reads back to score
/// the historical-performance band. Built from the `completed`/`failed`/
/// `duration_total_ms` counters the post-execution logging hook persists
/// to `metrics:agent:{id}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalStats {
    pub completed: u64,
    pub failed: u64,
    pub duration_total_ms: u64,
}

impl HistoricalStats {
    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            1.0
        } else {
            self.completed as f64 / total as f64
        }
    }

    pub fn avg_duration_seconds(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            0.0
        } else {
            (self.duration_total_ms as f64 / total as f64) / 1000.0
        }
    }
}

/// The four scoring bands plus their sum, retained individually so the
/// routing decision's `reason` can cite the dominant factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub capability: f64,
    pub historical: f64,
    pub availability: f64,
    pub cost: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.capability + self.historical + self.availability + self.cost
    }
}

fn capability_score(task: &Task, agent: &Agent) -> f64 {
    let mut score = 0.0;
    let category = derive_category(task);
    if agent.capabilities.contains(&category) {
        score += 20.0;
    }
    let prompt_lower = task.prompt.to_lowercase();
    let matched_keywords = agent.capabilities.iter().filter(|cap| prompt_lower.contains(cap.as_str())).count();
    score += 5.0 * matched_keywords as f64;

    if task.estimated_tokens() <= agent.token_limit {
        score += 10.0;
    } else {
        score -= 10.0;
    }
    score.clamp(0.0, 40.0)
}

fn historical_score(stats: &HistoricalStats) -> f64 {
    let score = 15.0 * stats.success_rate() + (15.0 - stats.avg_duration_seconds()).min(15.0);
    score.clamp(0.0, 30.0)
}

fn availability_score(agent: &Agent, now_ms: u64, queue_depth: u64) -> f64 {
    let mut score = 20.0 - 10.0 * agent.load - (2.0 * queue_depth as f64).min(10.0);
    if agent.heartbeat_fresh(now_ms, 60_000) {
        score += 5.0;
    }
    score.clamp(0.0, 20.0)
}

/// Piecewise step over `estimated_tokens * cost_per_token` (USD). Cheaper
/// requests score higher; the bands are deliberately coarse since cost
/// estimates carry more uncertainty than the other factors.
fn cost_score(task: &Task, agent: &Agent) -> f64 {
    let estimated_cost = task.estimated_tokens() as f64 * agent.cost_per_token;
    if estimated_cost <= 0.001 {
        10.0
    } else if estimated_cost <= 0.01 {
        7.0
    } else if estimated_cost <= 0.05 {
        4.0
    } else if estimated_cost <= 0.20 {
        1.0
    } else {
        0.0
    }
}

/// Scores one candidate agent against a task. `queue_depth` is the
/// agent's current ready-queue length across all priority classes.
pub fn score_agent(task: &Task, agent: &Agent, stats: &HistoricalStats, now_ms: u64, queue_depth: u64) -> ScoreBreakdown {
    ScoreBreakdown {
        capability: capability_score(task, agent),
        historical: historical_score(stats),
        availability: availability_score(agent, now_ms, queue_depth),
        cost: cost_score(task, agent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::Priority;

    fn task(prompt: &str) -> Task {
        Task::new(None, Some("architecture".into()), prompt.into(), Priority::Normal, 3).unwrap()
    }

    #[test]
    fn strong_capability_match_scores_high() {
        let agent = Agent::new("claude", "claude-3").with_capabilities(["architecture".to_string()]);
        let breakdown = score_agent(&task("design it"), &agent, &HistoricalStats::default(), 0, 0);
        assert_eq!(breakdown.capability, 30.0);
    }

    #[test]
    fn token_overflow_penalizes_capability() {
        let mut agent = Agent::new("claude", "claude-3");
        agent.token_limit = 1;
        let breakdown = score_agent(&task(&"word ".repeat(100)), &agent, &HistoricalStats::default(), 0, 0);
        assert_eq!(breakdown.capability, 0.0);
    }

    #[test]
    fn high_load_reduces_availability() {
        let mut agent = Agent::new("claude", "claude-3");
        agent.set_load(0.9);
        let breakdown = score_agent(&task("x"), &agent, &HistoricalStats::default(), 1_000_000, 0);
        assert_eq!(breakdown.availability, 11.0);
    }

    #[test]
    fn fresh_heartbeat_adds_bonus() {
        let mut agent = Agent::new("claude", "claude-3");
        agent.heartbeat(1_000);
        let breakdown = score_agent(&task("x"), &agent, &HistoricalStats::default(), 1_000, 0);
        assert_eq!(breakdown.availability, 20.0);
    }
}
