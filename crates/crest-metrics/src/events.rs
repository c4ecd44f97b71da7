//! Timeline annotations as InfluxDB line protocol.

use async_trait::async_trait;
use tracing::debug;

use crest_core::{Annotation, EventSink};

use crate::client::InfluxClient;

/// Writes annotations as rows in an events measurement, where a
/// dashboard can pick them up as chart annotations.
pub struct InfluxEventSink {
    client: InfluxClient,
    table: String,
}

impl InfluxEventSink {
    pub fn new(client: InfluxClient) -> Self {
        Self {
            client,
            table: "events".to_string(),
        }
    }

    /// Write into a different measurement than `events`.
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }
}

#[async_trait]
impl EventSink for InfluxEventSink {
    async fn write_event(&self, event: &Annotation) -> anyhow::Result<()> {
        let line = event_line(&self.table, event);
        debug!(line = %line, "writing event");
        self.client.write_line(&line).await?;
        Ok(())
    }
}

/// Render one annotation as a line-protocol row with a millisecond
/// timestamp. Tags are written in key order so rows are deterministic.
fn event_line(table: &str, event: &Annotation) -> String {
    let mut line = escape_measurement(table);

    let mut tags: Vec<_> = event.tags.iter().collect();
    tags.sort();
    for (key, value) in tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push_str(&format!(
        " title=\"{}\",description=\"{}\" {}",
        escape_field(&event.title),
        escape_field(&event.description),
        event.epoch_ms
    ));
    line
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn escape_field(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn event_line_orders_tags_and_escapes() {
        let event = Annotation {
            epoch_ms: 1534240000000,
            title: "Scaling up".to_string(),
            description: "Scaling iot/http-adapter to 3 replicas".to_string(),
            tags: HashMap::from([
                ("name".to_string(), "http adapter".to_string()),
                ("kind".to_string(), "deployments".to_string()),
            ]),
        };

        assert_eq!(
            event_line("events", &event),
            "events,kind=deployments,name=http\\ adapter \
             title=\"Scaling up\",description=\"Scaling iot/http-adapter to 3 replicas\" \
             1534240000000"
        );
    }

    #[test]
    fn event_line_without_tags_has_no_tag_section() {
        let event = Annotation {
            epoch_ms: 1,
            title: "Run finished".to_string(),
            description: String::new(),
            tags: HashMap::new(),
        };
        assert_eq!(
            event_line("events", &event),
            "events title=\"Run finished\",description=\"\" 1"
        );
    }

    #[test]
    fn field_values_escape_quotes_and_backslashes() {
        assert_eq!(escape_field(r#"say "hi" \now"#), r#"say \"hi\" \\now"#);
    }
}
