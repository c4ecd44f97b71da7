//! Minimal InfluxDB 1.x HTTP client.
//!
//! Speaks just enough of the `/query` and `/write` APIs for the
//! runner: scalar aggregate queries and line-protocol writes.
//! Connections are opened per request, which is plenty at one sample
//! every few seconds.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use tracing::debug;

use crest_core::{InfluxConfig, QueryError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings shared by the query and write endpoints.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    host: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> anyhow::Result<Self> {
        Ok(Self {
            host: host_port(&config.url)?,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Run a query and pull out its single aggregate value.
    pub async fn query_scalar(&self, q: &str) -> Result<f64, QueryError> {
        let mut path = format!(
            "/query?db={}&epoch=ms&q={}",
            percent_encode(&self.database),
            percent_encode(q)
        );
        self.push_auth(&mut path);

        debug!(query = q, "influx query");
        let req = http::Request::builder()
            .method("GET")
            .uri(&path)
            .header("host", self.host.clone())
            .body(Full::<Bytes>::default())
            .map_err(|e| QueryError::Http(e.to_string()))?;

        let (status, body) = http_call(&self.host, req).await?;
        extract_scalar(status, &body, q)
    }

    /// Write one line-protocol row with a millisecond timestamp.
    pub async fn write_line(&self, line: &str) -> Result<(), QueryError> {
        let mut path = format!("/write?db={}&precision=ms", percent_encode(&self.database));
        self.push_auth(&mut path);

        let req = http::Request::builder()
            .method("POST")
            .uri(&path)
            .header("host", self.host.clone())
            .body(Full::new(Bytes::from(line.to_string())))
            .map_err(|e| QueryError::Http(e.to_string()))?;

        let (status, body) = http_call(&self.host, req).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(QueryError::Api {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }

    fn push_auth(&self, path: &mut String) {
        if let Some(user) = &self.username {
            path.push_str("&u=");
            path.push_str(&percent_encode(user));
        }
        if let Some(pass) = &self.password {
            path.push_str("&p=");
            path.push_str(&percent_encode(pass));
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Dig the first value of the first series out of a query response.
fn extract_scalar(status: StatusCode, body: &[u8], q: &str) -> Result<f64, QueryError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<QueryResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        return Err(QueryError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let parsed: QueryResponse =
        serde_json::from_slice(body).map_err(|e| QueryError::Decode(e.to_string()))?;
    if let Some(message) = parsed.error {
        return Err(QueryError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let result = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| QueryError::NoData(q.to_string()))?;
    if let Some(message) = result.error {
        return Err(QueryError::Api {
            status: status.as_u16(),
            message,
        });
    }

    result
        .series
        .into_iter()
        .next()
        .and_then(|s| s.values.into_iter().next())
        .and_then(|row| row.into_iter().nth(1))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| QueryError::NoData(q.to_string()))
}

/// Single-request HTTP round trip against `host`.
async fn http_call(
    host: &str,
    req: http::Request<Full<Bytes>>,
) -> Result<(StatusCode, Bytes), QueryError> {
    let call = async {
        let stream = tokio::net::TcpStream::connect(host)
            .await
            .map_err(|e| QueryError::Http(e.to_string()))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| QueryError::Http(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| QueryError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| QueryError::Http(e.to_string()))?
            .to_bytes();
        Ok((status, body))
    };

    tokio::time::timeout(REQUEST_TIMEOUT, call)
        .await
        .map_err(|_| QueryError::Http("request timed out".to_string()))?
}

/// Extract `host:port` from a plain-http base url.
fn host_port(url: &str) -> anyhow::Result<String> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| anyhow::anyhow!("only plain http urls are supported: {url}"))?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        anyhow::bail!("missing host in url: {url}");
    }
    Ok(host.to_string())
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config(url: &str) -> InfluxConfig {
        InfluxConfig {
            url: url.to_string(),
            database: "simulator".to_string(),
            username: Some("runner".to_string()),
            password: Some("secret".to_string()),
            type_tag: "telemetry".to_string(),
            query_offset: "1m".to_string(),
            publish_measurement: "http-publish".to_string(),
            consumer_measurement: "consumer".to_string(),
        }
    }

    #[test]
    fn percent_encode_leaves_unreserved() {
        assert_eq!(percent_encode("abc-123_x.y~z"), "abc-123_x.y~z");
    }

    #[test]
    fn percent_encode_escapes_query_characters() {
        assert_eq!(
            percent_encode("mean(\"a b\")"),
            "mean%28%22a%20b%22%29"
        );
    }

    #[test]
    fn host_port_strips_scheme_and_path() {
        assert_eq!(
            host_port("http://influxdb:8086/ignored").unwrap(),
            "influxdb:8086"
        );
        assert_eq!(host_port("http://influxdb:8086").unwrap(), "influxdb:8086");
    }

    #[test]
    fn host_port_rejects_other_schemes() {
        assert!(host_port("https://influxdb:8086").is_err());
        assert!(host_port("influxdb:8086").is_err());
    }

    fn ok_body(json: &str) -> (StatusCode, Vec<u8>) {
        (StatusCode::OK, json.as_bytes().to_vec())
    }

    #[test]
    fn extract_scalar_reads_first_value() {
        let (status, body) = ok_body(
            r#"{"results":[{"statement_id":0,"series":[{"name":"http-publish","columns":["time","mean"],"values":[[1534240000000,0.015]]}]}]}"#,
        );
        assert_eq!(extract_scalar(status, &body, "q").unwrap(), 0.015);
    }

    #[test]
    fn extract_scalar_missing_series_is_no_data() {
        let (status, body) = ok_body(r#"{"results":[{"statement_id":0}]}"#);
        let err = extract_scalar(status, &body, "q").unwrap_err();
        assert!(matches!(err, QueryError::NoData(_)));
    }

    #[test]
    fn extract_scalar_null_value_is_no_data() {
        let (status, body) = ok_body(
            r#"{"results":[{"series":[{"values":[[1534240000000,null]]}]}]}"#,
        );
        let err = extract_scalar(status, &body, "q").unwrap_err();
        assert!(matches!(err, QueryError::NoData(_)));
    }

    #[test]
    fn extract_scalar_statement_error_is_api_error() {
        let (status, body) =
            ok_body(r#"{"results":[{"error":"measurement not found"}]}"#);
        let err = extract_scalar(status, &body, "q").unwrap_err();
        match err {
            QueryError::Api { status, message } => {
                assert_eq!(status, 200);
                assert_eq!(message, "measurement not found");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn extract_scalar_http_error_uses_payload_message() {
        let err = extract_scalar(
            StatusCode::UNAUTHORIZED,
            br#"{"error":"authorization failed"}"#,
            "q",
        )
        .unwrap_err();
        match err {
            QueryError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "authorization failed");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn extract_scalar_garbage_body_is_decode_error() {
        let err = extract_scalar(StatusCode::OK, b"<html>oops</html>", "q").unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[tokio::test]
    async fn query_scalar_against_stub_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");

        let served = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.expect("read request");
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();

            let body = r#"{"results":[{"statement_id":0,"series":[{"name":"http-publish","columns":["time","mean"],"values":[[1534240000000,0.015]]}]}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            request
        });

        let client = InfluxClient::new(&test_config(&format!("http://{addr}"))).unwrap();
        let value = client.query_scalar("SELECT mean(x) FROM y").await.unwrap();
        assert_eq!(value, 0.015);

        let request = served.await.unwrap();
        assert!(request.starts_with("GET /query?db=simulator&epoch=ms&q="));
        assert!(request.contains("q=SELECT%20mean%28x%29%20FROM%20y"));
        assert!(request.contains("&u=runner&p=secret"));
    }

    #[tokio::test]
    async fn write_line_reports_api_rejection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await;
            let body = r#"{"error":"field type conflict"}"#;
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });

        let client = InfluxClient::new(&test_config(&format!("http://{addr}"))).unwrap();
        let err = client.write_line("events title=\"x\" 1").await.unwrap_err();
        assert!(matches!(err, QueryError::Api { status: 400, .. }));
    }
}
