//! crest-metrics — InfluxDB 1.x backends for flow sampling and events.
//!
//! The simulators and consumers under test report into InfluxDB; this
//! crate reads their aggregates back out (`InfluxMetricsSource`) and
//! records what the run did as annotation rows (`InfluxEventSink`).

pub mod client;
pub mod events;
pub mod source;

pub use client::InfluxClient;
pub use events::InfluxEventSink;
pub use source::InfluxMetricsSource;
