//! Flow metrics over the InfluxDB query API.
//!
//! Four aggregates per sample, all over the same trailing window
//! shifted back by the ingestion lag offset: mean failure ratio, mean
//! round-trip time, and the sent/received sums turned into per-second
//! rates. The offset keeps the window clear of points that have not
//! landed in the database yet.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crest_core::{InfluxConfig, MetricSample, MetricsSource, QueryError, parse_duration};

use crate::client::InfluxClient;

pub struct InfluxMetricsSource {
    client: InfluxClient,
    type_tag: String,
    offset: Duration,
    publish_measurement: String,
    consumer_measurement: String,
}

impl InfluxMetricsSource {
    pub fn new(client: InfluxClient, config: &InfluxConfig) -> anyhow::Result<Self> {
        let offset = parse_duration(&config.query_offset)
            .ok_or_else(|| anyhow::anyhow!("invalid query_offset: {}", config.query_offset))?;
        Ok(Self {
            client,
            type_tag: config.type_tag.clone(),
            offset,
            publish_measurement: config.publish_measurement.clone(),
            consumer_measurement: config.consumer_measurement.clone(),
        })
    }

    /// How far queries trail behind the current instant.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    fn aggregate_query(&self, select: &str, measurement: &str, window: Duration) -> String {
        let start = to_influx_time(window + self.offset);
        let end = to_influx_time(self.offset);
        format!(
            "SELECT {select} FROM autogen.\"{measurement}\" WHERE (type = '{}') AND (time >= now() - {start}) AND (time < now() - {end})",
            self.type_tag
        )
    }
}

#[async_trait]
impl MetricsSource for InfluxMetricsSource {
    async fn sample(&self, window: Duration) -> Result<MetricSample, QueryError> {
        let secs = window.as_secs().max(1) as f64;

        let failure_ratio = self
            .client
            .query_scalar(&self.aggregate_query(
                "mean(failureRatio)",
                &self.publish_measurement,
                window,
            ))
            .await?;
        let rtt = self
            .client
            .query_scalar(&self.aggregate_query(
                "mean(avgDuration)",
                &self.publish_measurement,
                window,
            ))
            .await?;
        let sent = self
            .client
            .query_scalar(&self.aggregate_query("sum(sent)", &self.publish_measurement, window))
            .await?;
        let received = self
            .client
            .query_scalar(&self.aggregate_query(
                "sum(messageCount)",
                &self.consumer_measurement,
                window,
            ))
            .await?;

        Ok(MetricSample {
            epoch_ms: epoch_millis(),
            failure_ratio,
            rtt_ms: rtt.round() as u64,
            sent_rate: sent / secs,
            received_rate: received / secs,
        })
    }
}

fn to_influx_time(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source_config() -> InfluxConfig {
        InfluxConfig {
            url: "http://127.0.0.1:8086".to_string(),
            database: "simulator".to_string(),
            username: None,
            password: None,
            type_tag: "telemetry".to_string(),
            query_offset: "1m".to_string(),
            publish_measurement: "http-publish".to_string(),
            consumer_measurement: "consumer".to_string(),
        }
    }

    fn test_source() -> InfluxMetricsSource {
        let config = test_source_config();
        InfluxMetricsSource::new(InfluxClient::new(&config).unwrap(), &config).unwrap()
    }

    #[test]
    fn aggregate_query_shifts_the_window_by_the_offset() {
        let source = test_source();
        let q = source.aggregate_query(
            "mean(failureRatio)",
            "http-publish",
            Duration::from_secs(180),
        );
        assert_eq!(
            q,
            "SELECT mean(failureRatio) FROM autogen.\"http-publish\" \
             WHERE (type = 'telemetry') AND (time >= now() - 240000ms) \
             AND (time < now() - 60000ms)"
        );
    }

    #[test]
    fn invalid_offset_is_rejected() {
        let config = InfluxConfig {
            query_offset: "soon".to_string(),
            ..test_source_config()
        };
        let client = InfluxClient::new(&config).unwrap();
        assert!(InfluxMetricsSource::new(client, &config).is_err());
    }

    #[test]
    fn to_influx_time_renders_millis() {
        assert_eq!(to_influx_time(Duration::from_secs(240)), "240000ms");
        assert_eq!(to_influx_time(Duration::from_millis(500)), "500ms");
    }
}
