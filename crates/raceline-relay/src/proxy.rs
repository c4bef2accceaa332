//! Checkpoint-then-fetch relay logic.
//!
//! The relay keeps no state between calls. Within one submission the two
//! upstream calls are strictly ordered and never retried; de-duplicating a
//! resubmitted step is the engine's job, keyed by the checkpoint step.

use crate::config::RelayConfig;
use crate::upstream::{Checkpoint, HttpUpstream, Upstream, UpstreamError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use raceline_core::{ActionSubmission, Instruction};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("submitted instruction carries no step")]
    MissingStep,
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[source] UpstreamError),
    #[error("next instruction unavailable: {0}")]
    NextInstruction(#[source] UpstreamError),
    #[error("engine not ready: {0}")]
    Ready(#[source] UpstreamError),
}

impl RelayError {
    fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            RelayError::MissingStep => None,
            RelayError::Checkpoint(e) | RelayError::NextInstruction(e) | RelayError::Ready(e) => {
                Some(e)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.upstream() {
            None => StatusCode::BAD_REQUEST,
            Some(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operator-facing body.
    pub fn message(&self) -> &'static str {
        match self {
            RelayError::MissingStep => "Instruction has no step",
            RelayError::Checkpoint(_) => "Error validating instruction",
            RelayError::NextInstruction(_) => "Error fetching next instruction",
            RelayError::Ready(_) => "Error readying simulation",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        warn!("{self}");
        (self.status(), self.message()).into_response()
    }
}

/// What the relay hands to the console.
///
/// An engine answer that does not read as an instruction is forwarded as
/// sent. Deciding what to do with it is the console's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Relayed {
    Instruction(Instruction),
    Unrecognized(Value),
}

impl Relayed {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Relayed::Instruction(i) if i.is_terminal())
    }

    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            Relayed::Instruction(i) => Some(i),
            Relayed::Unrecognized(_) => None,
        }
    }
}

/// Turn the engine's "nothing more" into the finish sentinel.
///
/// Every path that hands an instruction to the console goes through here.
pub fn resolve_next(next: Option<Value>) -> Relayed {
    let raw = match next {
        None | Some(Value::Null) => {
            info!("engine has no further instructions, sending finish");
            return Relayed::Instruction(Instruction::finish());
        }
        Some(raw) => raw,
    };
    match serde_json::from_value::<Instruction>(raw.clone()) {
        Ok(instruction) => Relayed::Instruction(instruction),
        Err(e) => {
            warn!(%raw, "engine sent an unrecognized instruction, passing it on: {e}");
            Relayed::Unrecognized(raw)
        }
    }
}

pub struct Relay<U> {
    upstream: U,
    group_id: String,
    km_travelled: f64,
}

impl Relay<HttpUpstream> {
    pub fn from_config(config: &RelayConfig) -> Self {
        Relay::new(
            HttpUpstream::new(&config.upstream_url, config.upstream_timeout()),
            config,
        )
    }
}

impl<U: Upstream> Relay<U> {
    pub fn new(upstream: U, config: &RelayConfig) -> Self {
        Self {
            upstream,
            group_id: config.group_id.clone(),
            km_travelled: config.km_travelled,
        }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Confirm the echoed step, then hand back the next instruction.
    pub async fn handle_action(
        &self,
        submission: &ActionSubmission,
    ) -> Result<Relayed, RelayError> {
        let step = submission
            .instruction
            .checkpoint_key()
            .cloned()
            .ok_or(RelayError::MissingStep)?;
        info!(action = %submission.action, %step, "action received");

        let checkpoint = Checkpoint::new(step, self.group_id.clone(), self.km_travelled);
        self.upstream
            .checkpoint(&checkpoint)
            .await
            .map_err(RelayError::Checkpoint)?;
        debug!(step = %checkpoint.step, "checkpoint accepted");

        self.next().await
    }

    /// Fetch the next instruction without confirming anything.
    pub async fn handle_instruction(&self) -> Result<Relayed, RelayError> {
        self.next().await
    }

    pub async fn handle_ready(&self) -> Result<Value, RelayError> {
        let ack = self.upstream.ready().await.map_err(RelayError::Ready)?;
        info!("engine ready");
        Ok(ack)
    }

    async fn next(&self) -> Result<Relayed, RelayError> {
        let next = self
            .upstream
            .next_instruction()
            .await
            .map_err(RelayError::NextInstruction)?;
        Ok(resolve_next(next))
    }
}
