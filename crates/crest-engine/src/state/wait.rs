//! Fixed-delay wait step.

use std::time::{Duration, Instant};

use tracing::info;

use crate::graph::{Context, StateId};

/// Holds the ramp for a fixed duration, then moves on.
///
/// The deadline is re-armed on every entry, so a `Wait` sitting inside
/// a ramp cycle delays each lap.
pub struct Wait {
    duration: Duration,
    until: Instant,
    pub(crate) next: Option<StateId>,
}

impl Wait {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            until: Instant::now() + duration,
            next: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.until = Instant::now() + self.duration;
        info!(wait_ms = self.duration.as_millis() as u64, "waiting");
    }

    pub(crate) fn check(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        if Instant::now() >= self.until {
            ctx.advance(self.next);
        }
        Ok(())
    }
}
