//! The orchestrator platform binary's library half: configuration,
//! context wiring, telemetry, the admin HTTP surface, and the
//! `Platform`/`PlatformRuntime` boot sequence. The task-routing,
//! retry, hook, and transaction-log logic itself lives in the
//! `orchestrator-*` workspace crates this crate depends on and wires
//! together.

pub mod platform;

pub use platform::config::PlatformConfig;
pub use platform::context::PlatformContext;
pub use platform::runtime::{Platform, PlatformRuntime};
