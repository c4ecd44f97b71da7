//! crest-engine — cooperative scheduler for capacity ramps.
//!
//! A capacity ramp is a small graph of states driven by one scheduler
//! task. Each state inspects the world during its periodic check and
//! either stays put, hands off to another state, or finishes the ramp.
//!
//! # Architecture
//!
//! ```text
//! Runner (one spawned task)
//!   ├── pass: current.check(ctx) → apply requested transition
//!   │          └── repeat immediately while transitions are requested
//!   ├── sleep(tick)  ─or─  close() signal
//!   └── completion slot resolved once: Ok | CheckFailed | Closed
//!
//! States:
//!   ScaleUp        grow a pool by one replica, finish at the ceiling
//!   Wait           hold for a fixed duration
//!   WaitForStable  sample the flow until it proves (un)stable
//!   Simple         run a side effect and move on
//! ```
//!
//! # Stability gating
//!
//! `WaitForStable` wraps a pure `StabilityGate`: the first sample under
//! the failure threshold arms a fixed confirmation window, later
//! samples only refresh the best-observed figures, and the verdict
//! lands when the window (or the overall deadline) elapses. The window
//! is armed at most once per visit, which keeps a borderline flow from
//! oscillating the ramp.

pub mod error;
pub mod graph;
pub mod runner;
pub mod state;

pub use error::RunError;
pub use graph::{Context, StateGraph, StateId};
pub use runner::Runner;
pub use state::{
    BestConsumer, BoxFuture, GateVerdict, ScaleUp, SideEffect, SimpleState, StabilityGate,
    StablePolicy, State, Wait, WaitForStable,
};
