//! One-shot side-effect step.

use crate::graph::{Context, StateId};
use crate::state::BoxFuture;

/// Callback run on each visit to a [`SimpleState`].
pub type SideEffect = Box<dyn Fn() -> BoxFuture + Send + Sync>;

/// Runs a side effect, then moves straight on.
pub struct SimpleState {
    effect: SideEffect,
    pub(crate) next: Option<StateId>,
}

impl SimpleState {
    pub fn new(effect: SideEffect) -> Self {
        Self { effect, next: None }
    }

    pub(crate) async fn check(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.effect)().await?;
        ctx.advance(self.next);
        Ok(())
    }
}
