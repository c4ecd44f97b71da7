//! crest — capacity discovery experiment driver.
//!
//! Assembles the InfluxDB and cluster backends from `crest.toml` and
//! drives a scenario: repeatedly grow the workload and service pools
//! until one hits its ceiling or the flow stays unstable.
//!
//! # Usage
//!
//! ```text
//! crest run --scenario saturate
//! crest sample --window 3m
//! crest reset
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crest_cluster::{ClusterClient, ScaledPool};
use crest_core::{CrestConfig, DynPool, MetricsSource, parse_duration};
use crest_metrics::{InfluxClient, InfluxEventSink, InfluxMetricsSource};
use crest_scenario::{CsvRunLog, Experiment, RunPlan};

#[derive(Parser)]
#[command(name = "crest", about = "Capacity discovery experiment driver")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "crest.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reset the pools, then drive the scenario to completion.
    Run {
        /// Scenario to run, overriding the configured one.
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Print the current flow figures and exit.
    Sample {
        /// Trailing window to aggregate over, e.g. "3m".
        #[arg(long)]
        window: Option<String>,
    },
    /// Scale both pools back to the baseline and wait for the cluster.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crest=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = CrestConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Run { scenario } => run(&config, scenario.as_deref()).await,
        Command::Sample { window } => sample(&config, window.as_deref()).await,
        Command::Reset => reset(&config).await,
    }
}

async fn run(config: &CrestConfig, scenario: Option<&str>) -> anyhow::Result<()> {
    let influx = InfluxClient::new(&config.influx)?;
    let metrics = InfluxMetricsSource::new(influx.clone(), &config.influx)?;
    let events = Arc::new(InfluxEventSink::new(influx));

    let plan = RunPlan::from_config(config, scenario, metrics.offset())?;
    let log = Arc::new(CsvRunLog::new(
        &config.run.log_dir,
        &plan.scenario.to_string(),
    ));
    info!(path = %log.path().display(), "run log");

    let (service, workload) = pools(config)?;
    let experiment = Experiment::new(service, workload, Arc::new(metrics), events, log);
    experiment.run(&plan).await?;

    info!("run completed");
    Ok(())
}

async fn sample(config: &CrestConfig, window: Option<&str>) -> anyhow::Result<()> {
    let influx = InfluxClient::new(&config.influx)?;
    let metrics = InfluxMetricsSource::new(influx, &config.influx)?;

    let window_str = window.unwrap_or(&config.run.sample_window);
    let window = parse_duration(window_str)
        .ok_or_else(|| anyhow::anyhow!("invalid window duration: {window_str}"))?;

    let sample = metrics.sample(window).await?;
    println!("Failure rate:      {:8.2} %", sample.failure_ratio * 100.0);
    println!("RTT:               {:8} ms", sample.rtt_ms);
    println!("Sent:              {:8.1} msg/s", sample.sent_rate);
    println!("Received:          {:8.1} msg/s", sample.received_rate);
    Ok(())
}

async fn reset(config: &CrestConfig) -> anyhow::Result<()> {
    let influx = InfluxClient::new(&config.influx)?;
    let metrics = InfluxMetricsSource::new(influx.clone(), &config.influx)?;
    let events = Arc::new(InfluxEventSink::new(influx));

    let plan = RunPlan::from_config(config, None, metrics.offset())?;
    let log = Arc::new(CsvRunLog::new(
        &config.run.log_dir,
        &plan.scenario.to_string(),
    ));

    let (service, workload) = pools(config)?;
    let experiment = Experiment::new(service, workload, Arc::new(metrics), events, log);
    experiment.reset(&plan).await?;

    info!("pools back at baseline");
    Ok(())
}

fn pools(config: &CrestConfig) -> anyhow::Result<(DynPool, DynPool)> {
    let cluster = ClusterClient::new(&config.cluster)?;
    let service: DynPool = Arc::new(ScaledPool::new(cluster.clone(), config.service.pool_ref()));
    let workload: DynPool = Arc::new(ScaledPool::new(cluster, config.workload.pool_ref()));
    Ok((service, workload))
}
