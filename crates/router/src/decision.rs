use serde::{Deserialize, Serialize};

use crate::scoring::ScoreBreakdown;

/// One scored candidate, kept for the decision's fallback ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub agent_id: String,
    pub breakdown: ScoreBreakdown,
}

/// The result of `Router::route`. `fallbacks` is every other routable
/// candidate ordered best-to-worst, for the runtime to fall through to if
/// `primary_agent` turns out to be unavailable by dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub task_id: String,
    pub primary_agent: String,
    pub fallbacks: Vec<String>,
    pub score: f64,
    pub confidence: f64,
    pub reason: String,
    pub decided_at_ms: u64,
}

fn dominant_factor(breakdown: &ScoreBreakdown) -> &'static str {
    let bands = [
        ("strong capability match", breakdown.capability),
        ("strong historical performance", breakdown.historical),
        ("high availability", breakdown.availability),
        ("favorable cost", breakdown.cost),
    ];
    // `max_by` returns the last of equal maxima; fold manually so the
    // first band at a tied top score wins, since capability is listed
    // first and is the most specific explanation when bands are equal.
    bands
        .into_iter()
        .fold(None, |acc: Option<(&'static str, f64)>, (label, value)| match acc {
            Some((_, best)) if value <= best => acc,
            _ => Some((label, value)),
        })
        .map(|(label, _)| label)
        .unwrap_or("default scoring")
}

/// Builds the decision from a best-to-worst sorted candidate list.
/// `confidence` is `min(1, (best - second_best) / 20)`, or `1.0` when
/// there is only one candidate.
pub fn build_decision(task_id: &str, ranked: &[Candidate], now_ms: u64) -> RoutingDecision {
    let best = &ranked[0];
    let best_score = best.breakdown.total();
    let confidence = match ranked.get(1) {
        Some(second) => ((best_score - second.breakdown.total()) / 20.0).clamp(0.0, 1.0),
        None => 1.0,
    };
    RoutingDecision {
        task_id: task_id.to_string(),
        primary_agent: best.agent_id.clone(),
        fallbacks: ranked[1..].iter().map(|c| c.agent_id.clone()).collect(),
        score: best_score,
        confidence,
        reason: format!("{} (score {:.1})", dominant_factor(&best.breakdown), best_score),
        decided_at_ms: now_ms,
    }
}
