//! Kubernetes API client for the scale subresource.
//!
//! Talks plain HTTP to the API endpoint (typically a local
//! `kubectl proxy`) with an optional bearer token. Nothing but the
//! scale subresource of the configured objects is ever touched.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};

use crest_core::{ClusterConfig, PoolRef, ResourceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Scale subresource of a deployment-like object.
///
/// `metadata` rides along untouched so that a read-modify-write keeps
/// the object's `resourceVersion`; a concurrent change then fails the
/// PUT instead of being silently clobbered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scale {
    #[serde(rename = "apiVersion", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub spec: ScaleSpec,
    #[serde(default)]
    pub status: ScaleStatus,
}

/// Desired replica count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScaleSpec {
    #[serde(default)]
    pub replicas: u32,
}

/// Replica count the cluster reports as actually running.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScaleStatus {
    #[serde(default)]
    pub replicas: u32,
}

/// Connection settings for the cluster API endpoint.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    host: String,
    token: Option<String>,
}

impl ClusterClient {
    pub fn new(config: &ClusterConfig) -> anyhow::Result<Self> {
        Ok(Self {
            host: host_port(&config.url)?,
            token: config.token.clone(),
        })
    }

    /// Read the current scale of `target`.
    pub async fn get_scale(&self, target: &PoolRef) -> Result<Scale, ResourceError> {
        let req = self
            .request("GET", &scale_path(target))
            .body(Full::<Bytes>::default())
            .map_err(|e| ResourceError::Http(e.to_string()))?;

        let (status, body) = http_call(&self.host, req).await?;
        decode_scale(status, &body, target)
    }

    /// Replace the scale of `target`, returning the stored result.
    pub async fn put_scale(
        &self,
        target: &PoolRef,
        scale: &Scale,
    ) -> Result<Scale, ResourceError> {
        let payload =
            serde_json::to_vec(scale).map_err(|e| ResourceError::Decode(e.to_string()))?;
        let req = self
            .request("PUT", &scale_path(target))
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| ResourceError::Http(e.to_string()))?;

        let (status, body) = http_call(&self.host, req).await?;
        decode_scale(status, &body, target)
    }

    fn request(&self, method: &str, path: &str) -> http::request::Builder {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", self.host.clone())
            .header("accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder
    }
}

/// Path of the scale subresource under the apps API group.
fn scale_path(target: &PoolRef) -> String {
    format!(
        "/apis/apps/v1/namespaces/{}/{}/{}/scale",
        target.namespace, target.kind, target.name
    )
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    message: Option<String>,
}

/// Decode a scale response, folding API failures into `ResourceError`.
fn decode_scale(
    status: StatusCode,
    body: &[u8],
    target: &PoolRef,
) -> Result<Scale, ResourceError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<ApiStatus>(body)
            .ok()
            .and_then(|s| s.message)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        return Err(ResourceError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(body)
        .map_err(|e| ResourceError::Decode(format!("scale of {target}: {e}")))
}

/// Single-request HTTP round trip against `host`.
async fn http_call(
    host: &str,
    req: http::Request<Full<Bytes>>,
) -> Result<(StatusCode, Bytes), ResourceError> {
    let call = async {
        let stream = tokio::net::TcpStream::connect(host)
            .await
            .map_err(|e| ResourceError::Http(e.to_string()))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ResourceError::Http(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ResourceError::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ResourceError::Http(e.to_string()))?
            .to_bytes();
        Ok((status, body))
    };

    tokio::time::timeout(REQUEST_TIMEOUT, call)
        .await
        .map_err(|_| ResourceError::Http("request timed out".to_string()))?
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

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE_BODY: &str = r#"{"kind":"Scale","apiVersion":"autoscaling/v1","metadata":{"name":"http-simulator","namespace":"simulator","resourceVersion":"7241"},"spec":{"replicas":5},"status":{"replicas":4}}"#;

    fn target() -> PoolRef {
        PoolRef::new("simulator", "deployments", "http-simulator")
    }

    #[test]
    fn scale_path_addresses_the_subresource() {
        assert_eq!(
            scale_path(&target()),
            "/apis/apps/v1/namespaces/simulator/deployments/http-simulator/scale"
        );
    }

    #[test]
    fn decode_scale_reads_desired_and_observed() {
        let scale = decode_scale(StatusCode::OK, SCALE_BODY.as_bytes(), &target()).unwrap();
        assert_eq!(scale.spec.replicas, 5);
        assert_eq!(scale.status.replicas, 4);
        assert_eq!(scale.metadata["resourceVersion"], "7241");
    }

    #[test]
    fn modified_scale_serializes_with_its_resource_version() {
        let mut scale = decode_scale(StatusCode::OK, SCALE_BODY.as_bytes(), &target()).unwrap();
        scale.spec.replicas = 6;

        let body = serde_json::to_string(&scale).unwrap();
        assert!(body.contains(r#""resourceVersion":"7241""#));
        assert!(body.contains(r#""replicas":6"#));
    }

    #[test]
    fn decode_scale_failure_uses_the_status_message() {
        let body = r#"{"kind":"Status","status":"Failure","message":"forbidden","code":403}"#;
        let err = decode_scale(StatusCode::FORBIDDEN, body.as_bytes(), &target()).unwrap_err();
        match err {
            ResourceError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn decode_scale_garbage_is_a_decode_error() {
        let err = decode_scale(StatusCode::OK, b"<html>oops</html>", &target()).unwrap_err();
        assert!(matches!(err, ResourceError::Decode(_)));
    }

    #[test]
    fn host_port_strips_scheme_and_path() {
        assert_eq!(
            host_port("http://127.0.0.1:8001/ignored").unwrap(),
            "127.0.0.1:8001"
        );
        assert!(host_port("https://127.0.0.1:8001").is_err());
    }
}
