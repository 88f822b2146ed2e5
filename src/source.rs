use crate::config::Config;
use crate::snapshot::Snapshot;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Failure class used in logs and metrics: `transport` or `parse`.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) | FetchError::Status(_) => "transport",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// Body returned by the speed-test start endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StartAck {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Remote producer of telemetry snapshots.
pub trait TelemetrySource: Send + Sync + 'static {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, FetchError>> + Send;

    fn start_speedtest(&self) -> impl Future<Output = Result<StartAck, FetchError>> + Send;
}

pub struct HttpSource {
    client: Client,
    telemetry_url: String,
    speedtest_start_url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(cfg: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(cfg.user_agent.clone()).build()?;
        Ok(Self {
            client,
            telemetry_url: cfg.telemetry_url(),
            speedtest_start_url: cfg.speedtest_start_url(),
            timeout: cfg.fetch_timeout(),
        })
    }
}

impl TelemetrySource for HttpSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let resp = self
            .client
            .get(&self.telemetry_url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn start_speedtest(&self) -> Result<StartAck, FetchError> {
        let resp = self
            .client
            .post(&self.speedtest_start_url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        // the acknowledgement is informational, an unreadable one is not a failure
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }
}
