//! Deterministic scenario harness and regression locks.
//!
//! A scenario builds the same updates as a snapshot stream and as a
//! template + delta stream, checks every declared aggregate against the
//! snapshots after each prefix, and seals its `key=value` report with a drift
//! digest that is compared against a stored lock.

mod report;
mod rng;
mod scenario;
pub mod workload;

pub use report::{LockBook, LockReport, LockStatus, DRIFT_KEY};
pub use rng::Xorshift64;
pub use scenario::{builtin_scenarios, run_scenario, ScenarioKind, ScenarioOutcome, ScenarioSpec};
