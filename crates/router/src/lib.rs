//! Capability/historical-performance/availability/cost scoring and
//! routing decisions. Implements `orchestrator_hooks::RoutingAdvisor` so
//! the predictive-router hook can consult it without a cyclic crate
//! dependency.

pub mod cache;
pub mod category;
pub mod decision;
pub mod error;
pub mod router;
pub mod scoring;

pub use cache::RoutingCache;
pub use category::derive_category;
pub use decision::{build_decision, Candidate, RoutingDecision};
pub use error::RouterError;
pub use router::Router;
pub use scoring::{score_agent, HistoricalStats, ScoreBreakdown};
