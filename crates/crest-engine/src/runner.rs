//! Cooperative scheduler driving a state graph to completion.
//!
//! One spawned task owns the graph. Each pass runs the current state's
//! check, applies the requested transition, and keeps checking until a
//! pass requests none, so chains of instant transitions resolve within
//! a single tick. Between passes the task sleeps for the tick interval
//! or until the runner is closed. Closing never interrupts an in-flight
//! check; it only prevents further passes.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::RunError;
use crate::graph::{Context, StateGraph, StateId, Transition};

/// Handle to a running ramp.
///
/// The ramp resolves exactly once: `Ok(())` when a state finishes it,
/// [`RunError::CheckFailed`] when a check errors, or
/// [`RunError::Closed`] when the handle is closed first.
pub struct Runner {
    done: oneshot::Receiver<Result<(), RunError>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Runner {
    /// Spawn the drive task, entering the graph at `entry`.
    ///
    /// The first pass runs immediately; later passes follow every
    /// `tick`.
    pub fn start(graph: StateGraph, entry: StateId, tick: Duration) -> Self {
        let (done_tx, done_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(graph, entry, tick, done_tx, shutdown_rx));
        Self {
            done: done_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Wait for the ramp to finish.
    pub async fn complete(self) -> Result<(), RunError> {
        let outcome = self.done.await.unwrap_or(Err(RunError::Closed));
        let _ = self.task.await;
        outcome
    }

    /// Stop the ramp. A ramp still in flight resolves as
    /// [`RunError::Closed`]; one that already finished keeps its
    /// outcome. An in-flight check is left to finish first.
    pub async fn close(self) -> Result<(), RunError> {
        let _ = self.shutdown.send(true);
        let outcome = self.done.await.unwrap_or(Err(RunError::Closed));
        let _ = self.task.await;
        outcome
    }
}

async fn drive(
    mut graph: StateGraph,
    entry: StateId,
    tick: Duration,
    done: oneshot::Sender<Result<(), RunError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut current = entry;
    info!(state = %current, tick_ms = tick.as_millis() as u64, "ramp started");
    graph.get_mut(current).start();

    loop {
        match pass(&mut graph, &mut current).await {
            Ok(true) => {
                info!("ramp finished");
                let _ = done.send(Ok(()));
                return;
            }
            Ok(false) => {}
            Err(err) => {
                error!(error = %err, "ramp failed");
                let _ = done.send(Err(err));
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = shutdown.changed() => {
                info!("ramp closed");
                let _ = done.send(Err(RunError::Closed));
                return;
            }
        }
    }
}

/// One scheduler pass: check the current state, then chase requested
/// transitions until a check requests none. Returns `Ok(true)` when
/// the ramp finished.
async fn pass(graph: &mut StateGraph, current: &mut StateId) -> Result<bool, RunError> {
    loop {
        let mut ctx = Context::new();
        let state = graph.get_mut(*current);
        let label = state.label();
        if let Err(source) = state.check(&mut ctx).await {
            return Err(RunError::CheckFailed {
                state: label,
                source,
            });
        }

        match ctx.take() {
            None => return Ok(false),
            Some(Transition::Finish) => return Ok(true),
            Some(Transition::Goto(next)) => {
                let from = *current;
                debug!(from = %from, to = %next, "advancing");
                *current = next;
                graph.get_mut(next).start();
            }
        }
    }
}
