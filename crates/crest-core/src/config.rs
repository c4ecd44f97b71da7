//! crest.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::PoolRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrestConfig {
    pub influx: InfluxConfig,
    pub cluster: ClusterConfig,
    /// The pool under test.
    pub service: PoolConfig,
    /// The load generator pool.
    pub workload: PoolConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Value of the measurement `type` tag to filter on.
    #[serde(default = "default_type_tag")]
    pub type_tag: String,
    /// How far queries trail behind now() to skirt ingestion lag.
    #[serde(default = "default_query_offset")]
    pub query_offset: String,
    #[serde(default = "default_publish_measurement")]
    pub publish_measurement: String,
    #[serde(default = "default_consumer_measurement")]
    pub consumer_measurement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// API endpoint, e.g. a local `kubectl proxy`.
    pub url: String,
    /// Optional bearer token sent with every request.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub namespace: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub name: String,
    /// Ceiling for scale-up; reaching it ends the run successfully.
    pub max_replicas: u32,
}

impl PoolConfig {
    pub fn pool_ref(&self) -> PoolRef {
        PoolRef::new(&self.namespace, &self.kind, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default = "default_max_failure_ratio")]
    pub max_failure_ratio: f64,
    #[serde(default = "default_sample_window")]
    pub sample_window: String,
    #[serde(default = "default_stable_timeout")]
    pub stable_timeout: String,
    #[serde(default = "default_improve_window")]
    pub improve_window: String,
    #[serde(default = "default_tick")]
    pub tick: String,
    #[serde(default = "default_baseline")]
    pub baseline_replicas: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: String,
    #[serde(default = "default_reset_poll")]
    pub reset_poll: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
            max_failure_ratio: default_max_failure_ratio(),
            sample_window: default_sample_window(),
            stable_timeout: default_stable_timeout(),
            improve_window: default_improve_window(),
            tick: default_tick(),
            baseline_replicas: default_baseline(),
            reset_timeout: default_reset_timeout(),
            reset_poll: default_reset_poll(),
            log_dir: default_log_dir(),
        }
    }
}

impl CrestConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CrestConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_type_tag() -> String {
    "telemetry".to_string()
}

fn default_query_offset() -> String {
    "1m".to_string()
}

fn default_publish_measurement() -> String {
    "http-publish".to_string()
}

fn default_consumer_measurement() -> String {
    "consumer".to_string()
}

fn default_kind() -> String {
    "deployments".to_string()
}

fn default_scenario() -> String {
    "saturate".to_string()
}

fn default_max_failure_ratio() -> f64 {
    0.02
}

fn default_sample_window() -> String {
    "3m".to_string()
}

fn default_stable_timeout() -> String {
    "15m".to_string()
}

fn default_improve_window() -> String {
    "5m".to_string()
}

fn default_tick() -> String {
    "10s".to_string()
}

fn default_baseline() -> u32 {
    1
}

fn default_reset_timeout() -> String {
    "10m".to_string()
}

fn default_reset_poll() -> String {
    "1s".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Parse a duration string like "5s", "500ms", "3m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[influx]
url = "http://influxdb:8086"
database = "simulator"

[cluster]
url = "http://127.0.0.1:8001"

[service]
namespace = "iot"
name = "http-adapter"
max_replicas = 16

[workload]
namespace = "simulator"
name = "http-simulator"
max_replicas = 48
"#;

    #[test]
    fn parse_minimal_applies_defaults() {
        let config: CrestConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.influx.query_offset, "1m");
        assert_eq!(config.influx.publish_measurement, "http-publish");
        assert_eq!(config.service.kind, "deployments");
        assert_eq!(config.run.scenario, "saturate");
        assert_eq!(config.run.max_failure_ratio, 0.02);
        assert_eq!(config.run.baseline_replicas, 1);
    }

    #[test]
    fn run_section_overrides_defaults() {
        let toml_str = format!("{MINIMAL}\n[run]\nscenario = \"lockstep\"\ntick = \"5s\"\n");
        let config: CrestConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.run.scenario, "lockstep");
        assert_eq!(config.run.tick, "5s");
        // Untouched fields keep their defaults.
        assert_eq!(config.run.sample_window, "3m");
    }

    #[test]
    fn pool_ref_from_config() {
        let config: CrestConfig = toml::from_str(MINIMAL).unwrap();
        let pool = config.workload.pool_ref();
        assert_eq!(pool.namespace, "simulator");
        assert_eq!(pool.kind, "deployments");
        assert_eq!(pool.name, "http-simulator");
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("3m"), Some(Duration::from_secs(180)));
        assert_eq!(parse_duration("15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("nope"), None);
    }
}
