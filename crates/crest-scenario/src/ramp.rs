//! Experiment assembly: ramp graphs, baseline reset, run loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{info, warn};

use crest_core::{Annotation, DynEventSink, DynMetricsSource, DynPool, DynRunLogger};
use crest_engine::{
    BestConsumer, RunError, Runner, ScaleUp, SideEffect, SimpleState, StateGraph, StateId, Wait,
    WaitForStable,
};

use crate::plan::{RunPlan, ScenarioKind};
use crate::recorder::{Recorder, epoch_millis};

/// A capacity experiment over one service pool and one workload pool.
///
/// The experiment owns the whole run: reset both pools to the
/// baseline, drive the scenario's ramp graph to completion, and leave
/// a closing record and annotation behind.
pub struct Experiment {
    service: DynPool,
    workload: DynPool,
    metrics: DynMetricsSource,
    events: DynEventSink,
    log: DynRunLogger,
}

impl Experiment {
    pub fn new(
        service: DynPool,
        workload: DynPool,
        metrics: DynMetricsSource,
        events: DynEventSink,
        log: DynRunLogger,
    ) -> Self {
        Self {
            service,
            workload,
            metrics,
            events,
            log,
        }
    }

    pub async fn run(&self, plan: &RunPlan) -> anyhow::Result<()> {
        self.reset(plan).await?;

        let recorder = Arc::new(Recorder::new(
            self.metrics.clone(),
            self.workload.clone(),
            self.service.clone(),
            self.log.clone(),
            plan.policy.sample_window,
        ));
        let (graph, entry) = self.build_graph(plan, recorder.clone());

        info!(scenario = %plan.scenario, "starting ramp");
        let outcome = Runner::start(graph, entry, plan.tick).complete().await;

        // Best-effort closing record and annotation, on failure too.
        if let Err(e) = recorder.snapshot().await {
            warn!(error = %e, "closing snapshot failed");
        }
        self.write_outcome_event(&outcome).await;

        outcome.map_err(anyhow::Error::from)
    }

    /// Scale both pools to the baseline and hold until the cluster
    /// reports counts at or under it.
    pub async fn reset(&self, plan: &RunPlan) -> anyhow::Result<()> {
        info!(baseline = plan.baseline_replicas, "resetting pools");
        self.service.scale_to(plan.baseline_replicas).await?;
        self.workload.scale_to(plan.baseline_replicas).await?;

        let deadline = Instant::now() + plan.reset_timeout;
        loop {
            let service = self.service.observed_replicas().await?;
            let workload = self.workload.observed_replicas().await?;
            if service <= plan.baseline_replicas && workload <= plan.baseline_replicas {
                info!("pools reset");
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "pools did not reset within {:?}: service={service}, workload={workload}",
                    plan.reset_timeout
                );
            }
            sleep(plan.reset_poll).await;
        }
    }

    fn build_graph(&self, plan: &RunPlan, recorder: Arc<Recorder>) -> (StateGraph, StateId) {
        match plan.scenario {
            ScenarioKind::Saturate => self.saturate_graph(plan, recorder),
            ScenarioKind::Lockstep => self.lockstep_graph(plan, recorder),
        }
    }

    /// Push the workload up while the flow stays stable; compensate
    /// with a service replica when it does not.
    ///
    /// ```text
    /// Wait(warmup) → snapshot → ScaleUp(workload) → Wait(settle) ─┐
    ///      ┌─ on_success ─────────────────────────── verify ◄─────┤
    ///      └─ on_failure → ScaleUp(service) → Wait(settle) ───────┘
    /// ```
    fn saturate_graph(&self, plan: &RunPlan, recorder: Arc<Recorder>) -> (StateGraph, StateId) {
        let mut graph = StateGraph::new();

        let scale_workload = graph.add(ScaleUp::new(
            self.workload.clone(),
            self.events.clone(),
            plan.workload_ceiling,
        ));
        let scale_service = graph.add(ScaleUp::new(
            self.service.clone(),
            self.events.clone(),
            plan.service_ceiling,
        ));

        // Both settle waits converge on one shared verification state.
        let verify = graph.add(
            WaitForStable::new(
                self.metrics.clone(),
                plan.policy,
                scale_workload,
                scale_service,
            )
            .with_best_consumer(best_effect(recorder.clone())),
        );

        let settle_workload = graph.add(Wait::new(plan.settle));
        let settle_service = graph.add(Wait::new(plan.settle));
        graph.link(scale_workload, settle_workload);
        graph.link(settle_workload, verify);
        graph.link(scale_service, settle_service);
        graph.link(settle_service, verify);

        let warmup = graph.add(Wait::new(plan.warmup));
        let snapshot = graph.add(SimpleState::new(snapshot_effect(recorder)));
        graph.link(warmup, snapshot);
        graph.link(snapshot, scale_workload);

        (graph, warmup)
    }

    /// Alternate service and workload growth one replica at a time.
    /// Verification failures compensate by growing the service again.
    fn lockstep_graph(&self, plan: &RunPlan, recorder: Arc<Recorder>) -> (StateGraph, StateId) {
        let mut graph = StateGraph::new();

        let scale_service = graph.add(ScaleUp::new(
            self.service.clone(),
            self.events.clone(),
            plan.service_ceiling,
        ));
        let scale_workload = graph.add(ScaleUp::new(
            self.workload.clone(),
            self.events.clone(),
            plan.workload_ceiling,
        ));

        let verify_service = graph.add(
            WaitForStable::new(
                self.metrics.clone(),
                plan.policy,
                scale_workload,
                scale_service,
            )
            .with_best_consumer(best_effect(recorder.clone())),
        );
        let verify_workload = graph.add(
            WaitForStable::new(
                self.metrics.clone(),
                plan.policy,
                scale_service,
                scale_service,
            )
            .with_best_consumer(best_effect(recorder)),
        );

        let settle_service = graph.add(Wait::new(plan.settle));
        let settle_workload = graph.add(Wait::new(plan.settle));
        graph.link(scale_service, settle_service);
        graph.link(settle_service, verify_service);
        graph.link(scale_workload, settle_workload);
        graph.link(settle_workload, verify_workload);

        (graph, scale_service)
    }

    async fn write_outcome_event(&self, outcome: &Result<(), RunError>) {
        let (title, description) = match outcome {
            Ok(()) => ("Run completed", "Capacity ramp finished".to_string()),
            Err(e) => ("Run failed", e.to_string()),
        };
        let event = Annotation {
            epoch_ms: epoch_millis(),
            title: title.to_string(),
            description,
            tags: HashMap::new(),
        };
        if let Err(e) = self.events.write_event(&event).await {
            warn!(error = %e, "failed to record run outcome");
        }
    }
}

fn best_effect(recorder: Arc<Recorder>) -> BestConsumer {
    Box::new(move |best| {
        let recorder = recorder.clone();
        Box::pin(async move { recorder.record_best(best).await })
    })
}

fn snapshot_effect(recorder: Arc<Recorder>) -> SideEffect {
    Box::new(move || {
        let recorder = recorder.clone();
        Box::pin(async move { recorder.snapshot().await })
    })
}
