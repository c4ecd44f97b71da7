//! Value types shared between the engine and its backends.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a scalable pool of replicas in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolRef {
    pub namespace: String,
    /// Plural resource kind, e.g. "deployments" or "statefulsets".
    pub kind: String,
    pub name: String,
}

impl PoolRef {
    pub fn new(namespace: &str, kind: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One aggregated reading of the flow under load.
///
/// All figures cover the same trailing window: ratios and round-trip
/// time are window means, rates are window sums divided by the window
/// length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Sample time, unix millis.
    pub epoch_ms: u64,
    /// Mean request failure ratio, 0.0 to 1.0.
    pub failure_ratio: f64,
    /// Mean round-trip time in milliseconds.
    pub rtt_ms: u64,
    /// Requests sent upstream per second.
    pub sent_rate: f64,
    /// Messages received downstream per second.
    pub received_rate: f64,
}

/// The best reading observed inside a confirmation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSample {
    pub failure_ratio: f64,
    pub rtt_ms: u64,
    pub received_rate: f64,
}

impl From<&MetricSample> for BestSample {
    fn from(sample: &MetricSample) -> Self {
        Self {
            failure_ratio: sample.failure_ratio,
            rtt_ms: sample.rtt_ms,
            received_rate: sample.received_rate,
        }
    }
}

/// A timeline annotation recording something the run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Event time, unix millis.
    pub epoch_ms: u64,
    pub title: String,
    pub description: String,
    /// Tags attached to the event row, e.g. the pool coordinates.
    pub tags: HashMap<String, String>,
}

/// One line of the run log: flow figures plus both pool sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRecord {
    /// Record time, unix millis.
    pub epoch_ms: u64,
    pub received_rate: f64,
    pub failure_ratio: f64,
    pub rtt_ms: u64,
    pub workload_replicas: u32,
    pub service_replicas: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_ref_display_is_namespace_and_name() {
        let pool = PoolRef::new("iot", "deployments", "http-adapter");
        assert_eq!(pool.to_string(), "iot/http-adapter");
    }

    #[test]
    fn best_sample_copies_the_tracked_figures() {
        let sample = MetricSample {
            epoch_ms: 1000,
            failure_ratio: 0.015,
            rtt_ms: 240,
            sent_rate: 410.0,
            received_rate: 400.0,
        };
        let best = BestSample::from(&sample);
        assert_eq!(best.failure_ratio, 0.015);
        assert_eq!(best.rtt_ms, 240);
        assert_eq!(best.received_rate, 400.0);
    }
}
