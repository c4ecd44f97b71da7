//! Collaborator seams between the engine and its backends.
//!
//! The engine only ever talks to these traits. Production backends live
//! in `crest-metrics` (InfluxDB) and `crest-cluster` (Kubernetes scale
//! subresource); tests substitute in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{QueryError, ResourceError};
use crate::types::{Annotation, MetricSample, PoolRef, RunRecord};

/// A pool of identical replicas that can be resized.
///
/// Failures are reported as-is and never retried here; the caller
/// decides whether a failed operation is fatal.
#[async_trait]
pub trait ScalablePool: Send + Sync {
    /// The cluster object this pool maps to.
    fn target(&self) -> &PoolRef;

    /// Desired replica count, as configured on the cluster object.
    async fn replicas(&self) -> Result<u32, ResourceError>;

    /// Replica count the cluster currently reports as running.
    async fn observed_replicas(&self) -> Result<u32, ResourceError>;

    /// Set the desired replica count.
    async fn scale_to(&self, replicas: u32) -> Result<(), ResourceError>;
}

/// Aggregated flow metrics over a trailing window.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self, window: Duration) -> Result<MetricSample, QueryError>;
}

/// Sink for timeline annotations (scale-ups, run completion).
///
/// Callers log failures and carry on; a broken sink must not stop a run.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write_event(&self, event: &Annotation) -> anyhow::Result<()>;
}

/// Append-only log of run snapshots.
#[async_trait]
pub trait RunLogger: Send + Sync {
    async fn append(&self, record: &RunRecord) -> anyhow::Result<()>;
}

pub type DynPool = Arc<dyn ScalablePool>;
pub type DynMetricsSource = Arc<dyn MetricsSource>;
pub type DynEventSink = Arc<dyn EventSink>;
pub type DynRunLogger = Arc<dyn RunLogger>;
