//! HTTP client for the instruction relay, as used by the in-car console.

use crate::ClientError;
use crate::http::send_json;
use raceline_core::{ActionSubmission, Instruction, encode_action};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;

/// The relay's HTTP contract, as the console sees it.
pub trait RelayApi: Send + Sync {
    /// Move the engine into an active session.
    fn ready(&self) -> impl Future<Output = Result<serde_json::Value, ClientError>> + Send;

    /// Fetch the next instruction without confirming anything.
    fn next_instruction(&self) -> impl Future<Output = Result<Instruction, ClientError>> + Send;

    /// Confirm the echoed instruction and receive the next one.
    fn submit(
        &self,
        submission: &ActionSubmission,
    ) -> impl Future<Output = Result<Instruction, ClientError>> + Send;
}

pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl RelayApi for RelayClient {
    async fn ready(&self) -> Result<serde_json::Value, ClientError> {
        let request = self
            .http
            .post(format!("{}/api/ready", self.base_url))
            .timeout(self.timeout);
        send_json("ready", request).await
    }

    async fn next_instruction(&self) -> Result<Instruction, ClientError> {
        let request = self
            .http
            .get(format!("{}/api/instruction", self.base_url))
            .timeout(self.timeout);
        send_json("instruction fetch", request).await
    }

    async fn submit(&self, submission: &ActionSubmission) -> Result<Instruction, ClientError> {
        let body = encode_action(submission).map_err(|source| ClientError::Encode {
            operation: "action submission",
            source,
        })?;
        let request = self
            .http
            .post(format!("{}/api/action", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.timeout);
        send_json("action submission", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use raceline_core::{Action, Direction, StepId};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn submit_posts_echoed_instruction() {
        let app = Router::new().route(
            "/api/action",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["action"], "left");
                assert_eq!(body["instruction"]["step"], "4");
                Json(json!({"action": "finish"}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let relay = RelayClient::new(format!("http://{addr}/"), Duration::from_secs(5));
        let next = relay
            .submit(&ActionSubmission {
                action: Direction::Left,
                instruction: Instruction::new(Action::TurnLeft, "Campus", StepId::from(4)),
            })
            .await
            .unwrap();
        assert!(next.is_terminal());
    }
}
