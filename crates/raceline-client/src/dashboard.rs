//! REST client for the pilot server's control surface.

use crate::ClientError;
use crate::http::send_json;
pub use raceline_core::ApiReply;
use raceline_core::StatusSnapshot;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Control-surface call, used to label errors and drive the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    StartRace,
    Stop,
    Reset,
    TestConnectivity,
    Status,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::StartRace => "start race",
            Operation::Stop => "stop",
            Operation::Reset => "reset",
            Operation::TestConnectivity => "connectivity test",
            Operation::Status => "status",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the pilot server, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub start_timeout: Duration,
    pub request_timeout: Duration,
}

impl DashboardConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            start_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct DashboardClient {
    http: reqwest::Client,
    config: DashboardConfig,
}

impl DashboardClient {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn start_race(&self) -> Result<ApiReply, ClientError> {
        self.call(
            Method::POST,
            "/api/start-race",
            Operation::StartRace,
            self.config.start_timeout,
        )
        .await
    }

    pub async fn stop(&self) -> Result<ApiReply, ClientError> {
        self.call(
            Method::POST,
            "/api/stop",
            Operation::Stop,
            self.config.request_timeout,
        )
        .await
    }

    pub async fn reset(&self) -> Result<ApiReply, ClientError> {
        self.call(
            Method::POST,
            "/api/reset",
            Operation::Reset,
            self.config.request_timeout,
        )
        .await
    }

    pub async fn test_connectivity(&self) -> Result<ApiReply, ClientError> {
        self.call(
            Method::GET,
            "/api/test-connectivity",
            Operation::TestConnectivity,
            self.config.request_timeout,
        )
        .await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, ClientError> {
        self.call(
            Method::GET,
            "/api/status",
            Operation::Status,
            self.config.request_timeout,
        )
        .await
    }

    /// Dispatch by operation, for callers that map user input to calls.
    pub async fn run(&self, operation: Operation) -> Result<ApiReply, ClientError> {
        match operation {
            Operation::StartRace => self.start_race().await,
            Operation::Stop => self.stop().await,
            Operation::Reset => self.reset().await,
            Operation::TestConnectivity => self.test_connectivity().await,
            Operation::Status => {
                let snapshot = self.status().await?;
                Ok(ApiReply {
                    success: true,
                    message: format!(
                        "{} - {}/{} instructions, {:.2} km",
                        snapshot.status,
                        snapshot.instructions_processed,
                        snapshot.total_instructions,
                        snapshot.total_km_travelled
                    ),
                })
            }
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        operation: Operation,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let request = self.http.request(method, url).timeout(timeout);
        send_json(operation.as_str(), request).await
    }
}
