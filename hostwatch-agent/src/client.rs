//! HTTP push client for the kernel ingestion endpoint
//!
//! Fire-and-forget: a failed push is reported to the caller and dropped,
//! there is no retry queue.

use crate::metrics::MetricsSample;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = concat!("hostwatch-agent/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(StatusCode),
}

pub struct PushClient {
    url: String,
    node_name: String,
    http: reqwest::Client,
}

impl PushClient {
    pub fn new(url: impl Into<String>, node_name: impl Into<String>, timeout: Duration) -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            url: url.into(),
            node_name: node_name.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one sample; anything but 200 is an error
    pub async fn push(&self, sample: &MetricsSample) -> Result<(), PushError> {
        let response = self
            .http
            .post(&self.url)
            .header("Node-Name", &self.node_name)
            .json(sample)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(PushError::Status(response.status()));
        }
        debug!("Sample pushed to {}", self.url);
        Ok(())
    }

    /// Reachability check: any HTTP answer counts, only transport errors fail
    pub async fn test_connection(&self) -> Result<StatusCode, PushError> {
        let response = self.http.get(&self.url).send().await?;
        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hostwatch_devkit::StubCollector;

    fn sample() -> MetricsSample {
        MetricsSample {
            cpu_percent: 17.5,
            memory_total: 8_000_000_000,
            memory_used: 2_000_000_000,
            memory_percent: 25.0,
            cpu_temp: 48.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_push_sends_headers_and_body() {
        let stub = StubCollector::start().await.unwrap();
        let client = PushClient::new(stub.url(), "web1", Duration::from_secs(5)).unwrap();

        client.push(&sample()).await.unwrap();

        let pushes = stub.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].node_name.as_deref(), Some("web1"));
        assert_eq!(pushes[0].user_agent.as_deref(), Some(USER_AGENT));
        assert_eq!(pushes[0].body["cpu_percent"], 17.5);
        assert_eq!(pushes[0].body["memory_total"], 8_000_000_000u64);
        assert!(pushes[0].body["timestamp"].is_string());
        assert!(pushes[0].body.get("node_id").is_none());
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let stub = StubCollector::start().await.unwrap();
        stub.respond_with(StatusCode::SERVICE_UNAVAILABLE);
        let client = PushClient::new(stub.url(), "web1", Duration::from_secs(5)).unwrap();

        let err = client.push(&sample()).await.unwrap_err();
        assert!(matches!(err, PushError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api/metrics");

        let client = PushClient::new(url, "web1", Duration::from_millis(500)).unwrap();
        assert!(matches!(client.push(&sample()).await, Err(PushError::Transport(_))));
    }

    #[tokio::test]
    async fn test_connection_probe() {
        let stub = StubCollector::start().await.unwrap();
        let client = PushClient::new(stub.url(), "web1", Duration::from_secs(5)).unwrap();

        assert!(client.test_connection().await.unwrap().is_success());
        assert_eq!(stub.probe_count(), 1);
    }
}
