//! Engine errors.

use thiserror::Error;

/// Terminal outcome of a failed ramp.
#[derive(Debug, Error)]
pub enum RunError {
    /// A state's check returned an error; the ramp stopped there.
    #[error("check failed in {state} state: {source}")]
    CheckFailed {
        state: &'static str,
        source: anyhow::Error,
    },

    /// The runner was closed before the ramp finished.
    #[error("runner closed before completion")]
    Closed,
}
