//! Run snapshots and the semicolon-separated run log.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crest_core::{BestSample, DynMetricsSource, DynPool, DynRunLogger, RunLogger, RunRecord};

/// Takes point-in-time records of the flow and both pool sizes.
///
/// Metric and pool reads propagate their errors; only the log append
/// itself is forgiven, so a full disk cannot end a multi-hour run.
pub struct Recorder {
    metrics: DynMetricsSource,
    workload: DynPool,
    service: DynPool,
    log: DynRunLogger,
    sample_window: Duration,
}

impl Recorder {
    pub fn new(
        metrics: DynMetricsSource,
        workload: DynPool,
        service: DynPool,
        log: DynRunLogger,
        sample_window: Duration,
    ) -> Self {
        Self {
            metrics,
            workload,
            service,
            log,
            sample_window,
        }
    }

    /// Sample the flow and append one record.
    pub async fn snapshot(&self) -> anyhow::Result<()> {
        let sample = self.metrics.sample(self.sample_window).await?;
        self.record(sample.received_rate, sample.failure_ratio, sample.rtt_ms)
            .await
    }

    /// Append a record for figures already in hand.
    pub async fn record_best(&self, best: BestSample) -> anyhow::Result<()> {
        self.record(best.received_rate, best.failure_ratio, best.rtt_ms)
            .await
    }

    async fn record(
        &self,
        received_rate: f64,
        failure_ratio: f64,
        rtt_ms: u64,
    ) -> anyhow::Result<()> {
        let workload_replicas = self.workload.observed_replicas().await?;
        let service_replicas = self.service.observed_replicas().await?;

        let record = RunRecord {
            epoch_ms: epoch_millis(),
            received_rate,
            failure_ratio,
            rtt_ms,
            workload_replicas,
            service_replicas,
        };
        if let Err(e) = self.log.append(&record).await {
            warn!(error = %e, "failed to append run record");
        }
        Ok(())
    }
}

/// Append-only semicolon log, one line per record.
///
/// The file is opened fresh for each append, so nothing sits buffered
/// when a run dies.
pub struct CsvRunLog {
    path: PathBuf,
}

impl CsvRunLog {
    /// Log into `dir`, named after the scenario and start time.
    pub fn new(dir: &str, scenario: &str) -> Self {
        let stamp = Utc::now().format("%Y-%m-%d_%H%M");
        Self {
            path: PathBuf::from(dir).join(format!("{scenario}_{stamp}.log")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RunLogger for CsvRunLog {
    async fn append(&self, record: &RunRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(csv_line(record).as_bytes()).await?;
        Ok(())
    }
}

fn csv_line(record: &RunRecord) -> String {
    format!(
        "{};{};{:.4};{};{};{}\n",
        rfc3339(record.epoch_ms),
        record.received_rate,
        record.failure_ratio,
        record.rtt_ms,
        record.workload_replicas,
        record.service_replicas
    )
}

fn rfc3339(epoch_ms: u64) -> String {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| epoch_ms.to_string())
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
