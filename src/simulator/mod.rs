//! Pipeline simulator.
//!
//! Produces `PipelineRun`s one tick at a time. Nothing here touches the
//! clock or the network: timestamps come from the caller's origin and the
//! tick count, randomness from the configured seed.

mod engine;
mod history;
mod script;

pub use engine::{start_run, Advance, StageEvent};
pub use history::simulate_history;
