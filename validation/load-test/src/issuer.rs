//! Single-request execution against the inference endpoint.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::config::{LoadTestConfig, PayloadTemplate};
use crate::error::{LoadTestError, LoadTestResult};

/// Why an attempt did not count as a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Response arrived with a non-2xx status.
    Status(u16),
    /// Connection, protocol or body read error.
    Transport(String),
    /// No complete response within the request timeout.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Status(code) => write!(f, "HTTP {}", code),
            FailureKind::Transport(msg) => write!(f, "transport error: {}", msg),
            FailureKind::Timeout => write!(f, "timed out"),
        }
    }
}

/// Result of one request attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { latency: Duration },
    Failure(FailureKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Latency in seconds for successful attempts.
    pub fn latency_secs(&self) -> Option<f64> {
        match self {
            Outcome::Success { latency } => Some(latency.as_secs_f64()),
            Outcome::Failure(_) => None,
        }
    }
}

/// Response captured by [`RequestIssuer::probe`].
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub latency: Duration,
    pub body: serde_json::Value,
}

/// Sends timed POST requests to one endpoint.
///
/// The HTTP client keeps up to `concurrency` idle connections to the target so
/// that every gate slot can reuse a warm connection.
#[derive(Debug, Clone)]
pub struct RequestIssuer {
    client: reqwest::Client,
    url: reqwest::Url,
    payload: PayloadTemplate,
    max_tokens: u32,
    timeout: Duration,
}

impl RequestIssuer {
    /// Create an issuer for the endpoint and payload described by `config`.
    pub fn new(config: &LoadTestConfig) -> LoadTestResult<Self> {
        let url = reqwest::Url::parse(&config.target_url).map_err(|e| LoadTestError::InvalidUrl {
            url: config.target_url.clone(),
            message: e.to_string(),
        })?;
        let timeout = config.request_timeout();

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(config.concurrency.max(1) as usize)
            .build()?;

        Ok(Self {
            client,
            url,
            payload: config.payload.clone(),
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// Send one request and classify it. Never fails; problems become `Outcome::Failure`.
    pub async fn issue(&self) -> Outcome {
        let body = self.payload.body(self.max_tokens);
        let start = Instant::now();

        match tokio::time::timeout(self.timeout, self.exchange(&body)).await {
            Ok(Ok((status, _bytes))) if (200..300).contains(&status) => Outcome::Success {
                latency: start.elapsed(),
            },
            Ok(Ok((status, _))) => {
                debug!(status, url = %self.url, "Request returned non-success status");
                Outcome::Failure(FailureKind::Status(status))
            }
            Ok(Err(e)) => {
                debug!(error = %e, url = %self.url, "Request failed");
                Outcome::Failure(e)
            }
            Err(_) => {
                debug!(timeout_secs = self.timeout.as_secs_f64(), url = %self.url, "Request timed out");
                Outcome::Failure(FailureKind::Timeout)
            }
        }
    }

    /// Send `text` with the configured payload schema and return the parsed response.
    pub async fn probe(&self, text: &str) -> Result<ProbeResponse, FailureKind> {
        let body = self.payload.with_text(text).body(self.max_tokens);
        let start = Instant::now();

        let (status, bytes) = tokio::time::timeout(self.timeout, self.exchange(&body))
            .await
            .map_err(|_| FailureKind::Timeout)??;
        let latency = start.elapsed();

        if !(200..300).contains(&status) {
            return Err(FailureKind::Status(status));
        }

        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        Ok(ProbeResponse {
            status,
            latency,
            body,
        })
    }

    /// `GET /health` on the target's origin.
    pub async fn health_check(&self) -> Result<(), FailureKind> {
        let health_url = self
            .url
            .join("/health")
            .map_err(|e| FailureKind::Transport(e.to_string()))?;

        let response = self
            .client
            .get(health_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(FailureKind::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// POST the body and read the whole response.
    async fn exchange(&self, body: &serde_json::Value) -> Result<(u16, Bytes), FailureKind> {
        let response = self
            .client
            .post(self.url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| FailureKind::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FailureKind::Transport(e.to_string()))?;
        Ok((status, bytes))
    }
}
