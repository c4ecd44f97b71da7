//! Stability verification with a bounded confirmation window.
//!
//! After a scale-up the flow needs time to prove itself. Each pass
//! samples the flow and feeds a pure [`StabilityGate`]: the first
//! sample under the failure threshold arms a fixed-length confirmation
//! window, samples inside the window only refresh the best-observed
//! figures, and when the window elapses the gate reports stable with
//! those figures. If no sample crosses the threshold before the
//! overall deadline the gate reports unstable. The window is armed at
//! most once per visit, so a single good sample followed by bad ones
//! still resolves one window later instead of oscillating.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crest_core::{BestSample, DynMetricsSource, MetricSample};

use crate::graph::{Context, StateId};
use crate::state::BoxFuture;

/// Thresholds and windows for stability verification.
#[derive(Debug, Clone, Copy)]
pub struct StablePolicy {
    /// A sample strictly under this failure ratio arms the window.
    pub max_failure_ratio: f64,
    /// Trailing window each sample aggregates over.
    pub sample_window: Duration,
    /// Deadline for arming the window, measured from entry.
    pub stable_timeout: Duration,
    /// Length of the confirmation window.
    pub improve_window: Duration,
}

/// What the gate concluded from one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateVerdict {
    /// Keep sampling.
    Pending,
    /// The confirmation window elapsed; here are the best figures seen.
    Stable(BestSample),
    /// The deadline passed without a sample under the threshold.
    Unstable,
}

/// Pure decision core of [`WaitForStable`].
///
/// Time enters only through the `now` argument, so the whole
/// hysteresis behavior is testable without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGate {
    max_failure_ratio: f64,
    improve_window: Duration,
    deadline: Instant,
    window_end: Option<Instant>,
    best: BestSample,
}

impl StabilityGate {
    /// Arm a fresh gate at `now`.
    pub fn arm(policy: &StablePolicy, now: Instant) -> Self {
        Self {
            max_failure_ratio: policy.max_failure_ratio,
            improve_window: policy.improve_window,
            deadline: now + policy.stable_timeout,
            window_end: None,
            best: BestSample {
                failure_ratio: f64::INFINITY,
                rtt_ms: 0,
                received_rate: 0.0,
            },
        }
    }

    /// Fold one sample in and report the verdict.
    pub fn observe(&mut self, now: Instant, sample: &MetricSample) -> GateVerdict {
        if let Some(end) = self.window_end {
            if now >= end {
                return GateVerdict::Stable(self.best);
            }
            if sample.failure_ratio < self.best.failure_ratio {
                self.best = BestSample::from(sample);
            }
            GateVerdict::Pending
        } else if sample.failure_ratio < self.max_failure_ratio {
            // First crossing arms the window; it is never re-armed.
            self.window_end = Some(now + self.improve_window);
            self.best = BestSample::from(sample);
            GateVerdict::Pending
        } else if now >= self.deadline {
            GateVerdict::Unstable
        } else {
            GateVerdict::Pending
        }
    }
}

/// Callback invoked with the best-observed figures right before a
/// stable verdict advances the ramp.
pub type BestConsumer = Box<dyn Fn(BestSample) -> BoxFuture + Send + Sync>;

/// Samples the flow each pass until it proves stable or the deadline
/// passes, then advances to the matching edge.
pub struct WaitForStable {
    metrics: DynMetricsSource,
    policy: StablePolicy,
    gate: StabilityGate,
    on_success: StateId,
    on_failure: StateId,
    on_best: Option<BestConsumer>,
}

impl WaitForStable {
    pub fn new(
        metrics: DynMetricsSource,
        policy: StablePolicy,
        on_success: StateId,
        on_failure: StateId,
    ) -> Self {
        let gate = StabilityGate::arm(&policy, Instant::now());
        Self {
            metrics,
            policy,
            gate,
            on_success,
            on_failure,
            on_best: None,
        }
    }

    /// Attach a consumer for the best-observed figures.
    pub fn with_best_consumer(mut self, consumer: BestConsumer) -> Self {
        self.on_best = Some(consumer);
        self
    }

    pub(crate) fn start(&mut self) {
        self.gate = StabilityGate::arm(&self.policy, Instant::now());
        info!(
            max_failure = self.policy.max_failure_ratio,
            timeout_ms = self.policy.stable_timeout.as_millis() as u64,
            "verifying stability"
        );
    }

    pub(crate) async fn check(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        let sample = self.metrics.sample(self.policy.sample_window).await?;
        info!(
            failure = sample.failure_ratio,
            rtt_ms = sample.rtt_ms,
            sent = sample.sent_rate,
            received = sample.received_rate,
            "sampled flow"
        );

        match self.gate.observe(Instant::now(), &sample) {
            GateVerdict::Pending => {}
            GateVerdict::Stable(best) => {
                info!(
                    failure = best.failure_ratio,
                    rtt_ms = best.rtt_ms,
                    received = best.received_rate,
                    "flow stable"
                );
                if let Some(consumer) = &self.on_best {
                    consumer(best).await?;
                }
                ctx.advance(Some(self.on_success));
            }
            GateVerdict::Unstable => {
                warn!(
                    timeout_ms = self.policy.stable_timeout.as_millis() as u64,
                    "flow failed to stabilize"
                );
                ctx.advance(Some(self.on_failure));
            }
        }
        Ok(())
    }
}
