//! crest-scenario — experiment wiring over the ramp engine.
//!
//! Turns configuration into a concrete experiment: resolves timings
//! into a [`RunPlan`], builds the scenario's state graph, resets the
//! pools to a baseline, and records what the run saw into the
//! semicolon run log and the event sink.

pub mod plan;
pub mod ramp;
pub mod recorder;

pub use plan::{RunPlan, ScenarioKind};
pub use ramp::Experiment;
pub use recorder::{CsvRunLog, Recorder};
