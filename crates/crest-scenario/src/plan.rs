//! Resolved timings and ceilings for one experiment run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crest_core::{CrestConfig, parse_duration};
use crest_engine::StablePolicy;

/// Which ramp graph to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Grow the workload while the flow stays stable; compensate with
    /// service replicas when it does not.
    Saturate,
    /// Alternate service and workload growth one replica at a time.
    Lockstep,
}

impl FromStr for ScenarioKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saturate" => Ok(Self::Saturate),
            "lockstep" => Ok(Self::Lockstep),
            other => anyhow::bail!("unknown scenario: {other}"),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioKind::Saturate => write!(f, "saturate"),
            ScenarioKind::Lockstep => write!(f, "lockstep"),
        }
    }
}

/// Everything a ramp needs, durations parsed and derived waits
/// precomputed.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub scenario: ScenarioKind,
    pub policy: StablePolicy,
    /// Scheduler tick.
    pub tick: Duration,
    /// Hold after each scale-up before verification starts. Covers one
    /// sample window plus the metrics ingestion lag, so the first
    /// verification sample only sees the resized pool.
    pub settle: Duration,
    /// Hold before the first scale-up, giving the freshly reset system
    /// two clean sample windows.
    pub warmup: Duration,
    pub service_ceiling: u32,
    pub workload_ceiling: u32,
    pub baseline_replicas: u32,
    pub reset_timeout: Duration,
    pub reset_poll: Duration,
}

impl RunPlan {
    /// Resolve a plan from the configuration. `scenario` overrides the
    /// configured one; `query_offset` is the metrics source's ingestion
    /// lag, which stretches the derived waits.
    pub fn from_config(
        config: &CrestConfig,
        scenario: Option<&str>,
        query_offset: Duration,
    ) -> anyhow::Result<Self> {
        let run = &config.run;
        let kind: ScenarioKind = scenario.unwrap_or(&run.scenario).parse()?;

        let sample_window = duration_field("sample_window", &run.sample_window)?;
        let policy = StablePolicy {
            max_failure_ratio: run.max_failure_ratio,
            sample_window,
            stable_timeout: duration_field("stable_timeout", &run.stable_timeout)?,
            improve_window: duration_field("improve_window", &run.improve_window)?,
        };

        Ok(Self {
            scenario: kind,
            policy,
            tick: duration_field("tick", &run.tick)?,
            settle: sample_window + query_offset,
            warmup: sample_window * 2 + query_offset,
            service_ceiling: config.service.max_replicas,
            workload_ceiling: config.workload.max_replicas,
            baseline_replicas: run.baseline_replicas,
            reset_timeout: duration_field("reset_timeout", &run.reset_timeout)?,
            reset_poll: duration_field("reset_poll", &run.reset_poll)?,
        })
    }
}

fn duration_field(name: &str, value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).ok_or_else(|| anyhow::anyhow!("invalid {name} duration: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crest_core::{ClusterConfig, InfluxConfig, PoolConfig, RunConfig};

    fn test_config() -> CrestConfig {
        CrestConfig {
            influx: InfluxConfig {
                url: "http://influxdb:8086".to_string(),
                database: "simulator".to_string(),
                username: None,
                password: None,
                type_tag: "telemetry".to_string(),
                query_offset: "1m".to_string(),
                publish_measurement: "http-publish".to_string(),
                consumer_measurement: "consumer".to_string(),
            },
            cluster: ClusterConfig {
                url: "http://127.0.0.1:8001".to_string(),
                token: None,
            },
            service: PoolConfig {
                namespace: "iot".to_string(),
                kind: "deployments".to_string(),
                name: "http-adapter".to_string(),
                max_replicas: 16,
            },
            workload: PoolConfig {
                namespace: "simulator".to_string(),
                kind: "deployments".to_string(),
                name: "http-simulator".to_string(),
                max_replicas: 48,
            },
            run: RunConfig::default(),
        }
    }

    #[test]
    fn derives_settle_and_warmup_from_window_and_offset() {
        let offset = Duration::from_secs(60);
        let plan = RunPlan::from_config(&test_config(), None, offset).unwrap();

        // Defaults: 3m sample window, so 3m+1m settle and 2*3m+1m warmup.
        assert_eq!(plan.settle, Duration::from_secs(240));
        assert_eq!(plan.warmup, Duration::from_secs(420));
        assert_eq!(plan.policy.sample_window, Duration::from_secs(180));
        assert_eq!(plan.scenario, ScenarioKind::Saturate);
        assert_eq!(plan.service_ceiling, 16);
        assert_eq!(plan.workload_ceiling, 48);
    }

    #[test]
    fn explicit_scenario_overrides_the_configured_one() {
        let plan =
            RunPlan::from_config(&test_config(), Some("lockstep"), Duration::ZERO).unwrap();
        assert_eq!(plan.scenario, ScenarioKind::Lockstep);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        let err = RunPlan::from_config(&test_config(), Some("zigzag"), Duration::ZERO)
            .unwrap_err();
        assert!(err.to_string().contains("unknown scenario"));
    }

    #[test]
    fn malformed_duration_names_the_field() {
        let mut config = test_config();
        config.run.stable_timeout = "soon".to_string();
        let err = RunPlan::from_config(&config, None, Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("stable_timeout"));
    }
}
