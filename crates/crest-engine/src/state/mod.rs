//! The four state kinds of a capacity ramp.

mod scale_up;
mod simple;
mod stable;
mod wait;

pub use scale_up::ScaleUp;
pub use simple::{SideEffect, SimpleState};
pub use stable::{BestConsumer, GateVerdict, StabilityGate, StablePolicy, WaitForStable};
pub use wait::Wait;

use crate::graph::Context;

/// Boxed future returned by state callbacks.
pub type BoxFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

/// A node in the ramp graph.
pub enum State {
    ScaleUp(ScaleUp),
    Wait(Wait),
    WaitForStable(WaitForStable),
    Simple(SimpleState),
}

impl State {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            State::ScaleUp(_) => "scale-up",
            State::Wait(_) => "wait",
            State::WaitForStable(_) => "wait-for-stable",
            State::Simple(_) => "simple",
        }
    }

    /// Called each time the runner enters this state.
    pub(crate) fn start(&mut self) {
        match self {
            State::Wait(s) => s.start(),
            State::WaitForStable(s) => s.start(),
            State::ScaleUp(_) | State::Simple(_) => {}
        }
    }

    /// One scheduler pass over this state.
    pub(crate) async fn check(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        match self {
            State::ScaleUp(s) => s.check(ctx).await,
            State::Wait(s) => s.check(ctx),
            State::WaitForStable(s) => s.check(ctx).await,
            State::Simple(s) => s.check(ctx).await,
        }
    }
}

impl From<ScaleUp> for State {
    fn from(s: ScaleUp) -> Self {
        State::ScaleUp(s)
    }
}

impl From<Wait> for State {
    fn from(s: Wait) -> Self {
        State::Wait(s)
    }
}

impl From<WaitForStable> for State {
    fn from(s: WaitForStable) -> Self {
        State::WaitForStable(s)
    }
}

impl From<SimpleState> for State {
    fn from(s: SimpleState) -> Self {
        State::Simple(s)
    }
}
