//! The race engine, as consumed by the relay.

use raceline_core::StepId;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Body of `POST /checkpoint`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub step: StepId,
    pub id: StepId,
    pub group_id: String,
    pub km_travelled: f64,
}

impl Checkpoint {
    pub fn new(step: StepId, group_id: impl Into<String>, km_travelled: f64) -> Self {
        Self {
            kind: "checkpoint",
            id: step.clone(),
            step,
            group_id: group_id.into(),
            km_travelled,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("engine did not answer in time")]
    Timeout,
    #[error("engine unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("engine answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("engine sent an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl UpstreamError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unreachable(e)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout)
    }
}

/// The engine contract.
pub trait Upstream: Send + Sync + 'static {
    /// Confirm a completed step. The acknowledgement body is not inspected.
    fn checkpoint(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl Future<Output = Result<(), UpstreamError>> + Send;

    /// The engine's answer as sent. `None` for an empty body.
    fn next_instruction(&self) -> impl Future<Output = Result<Option<Value>, UpstreamError>> + Send;

    fn ready(&self) -> impl Future<Output = Result<Value, UpstreamError>> + Send;
}

pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn body(request: reqwest::RequestBuilder) -> Result<String, UpstreamError> {
        let response = request.send().await.map_err(UpstreamError::from_reqwest)?;
        let status = response.status();
        let body = response.text().await.map_err(UpstreamError::from_reqwest)?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl Upstream for HttpUpstream {
    async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), UpstreamError> {
        let request = self
            .http
            .post(format!("{}/checkpoint", self.base_url))
            .json(checkpoint)
            .timeout(self.timeout);
        Self::body(request).await.map(drop)
    }

    async fn next_instruction(&self) -> Result<Option<Value>, UpstreamError> {
        let request = self
            .http
            .get(format!("{}/next-instruction", self.base_url))
            .timeout(self.timeout);
        let body = Self::body(request).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body).map_err(UpstreamError::Decode)
    }

    async fn ready(&self) -> Result<Value, UpstreamError> {
        let request = self
            .http
            .post(format!("{}/ready", self.base_url))
            .json(&serde_json::json!({}))
            .timeout(self.timeout);
        let body = Self::body(request).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(UpstreamError::Decode)
    }
}
