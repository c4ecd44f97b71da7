//! crest-core — shared types, traits, and configuration for crest.
//!
//! Everything the engine and its backends agree on lives here: the
//! collaborator traits (`ScalablePool`, `MetricsSource`, `EventSink`,
//! `RunLogger`), the value types flowing between them, the error
//! taxonomy, and the `crest.toml` parser.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{
    ClusterConfig, CrestConfig, InfluxConfig, PoolConfig, RunConfig, parse_duration,
};
pub use error::{QueryError, ResourceError};
pub use traits::{
    DynEventSink, DynMetricsSource, DynPool, DynRunLogger, EventSink, MetricsSource, RunLogger,
    ScalablePool,
};
pub use types::{Annotation, BestSample, MetricSample, PoolRef, RunRecord};
