//! Push-channel envelopes and the codec shared by every display surface.
//!
//! Decoding is strict: an unknown `type`, an unknown race status or a payload
//! that breaks an invariant is a [`DecodeError`]. Callers drop the offending
//! message and keep the connection.

use crate::{
    ActionSubmission, Instruction, InvalidInstruction, InvalidSnapshot, RaceStatus, StatusSnapshot,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from the pilot backend to a display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Latest race progress.
    Status { data: StatusSnapshot },
    /// Reply to a ping; carries the same snapshot as `Status`.
    Pong { data: StatusSnapshot },
    /// A new navigation step.
    Instruction { data: Instruction },
    /// Free-form log line for the operator.
    Log { message: String },
}

impl PushMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::Status { .. } => "status",
            PushMessage::Pong { .. } => "pong",
            PushMessage::Instruction { .. } => "instruction",
            PushMessage::Log { .. } => "log",
        }
    }

    /// The snapshot carried by `status` and `pong`, which are rendered alike.
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        match self {
            PushMessage::Status { data } | PushMessage::Pong { data } => Some(data),
            _ => None,
        }
    }
}

/// Messages sent from a display to the pilot backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat; answered with a `pong`.
    Ping,
}

/// `{success, message}` answer of the pilot control endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiReply {
    pub success: bool,
    pub message: String,
}

impl ApiReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Why an inbound message was dropped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message has no type tag")]
    MissingType,
    #[error("unrecognized message type: {0}")]
    UnknownType(String),
    #[error("unrecognized race status: {0}")]
    UnknownStatus(String),
    #[error("invalid status snapshot: {0}")]
    InvalidSnapshot(#[from] InvalidSnapshot),
    #[error("invalid instruction: {0}")]
    InvalidInstruction(#[from] InvalidInstruction),
}

const PUSH_TYPES: [&str; 4] = ["status", "pong", "instruction", "log"];

/// Decode one push-channel frame.
pub fn decode_push(raw: &str) -> Result<PushMessage, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let kind = message_type(&value)?;
    if !PUSH_TYPES.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }
    if matches!(kind, "status" | "pong")
        && let Some(status) = value.pointer("/data/status").and_then(Value::as_str)
    {
        status
            .parse::<RaceStatus>()
            .map_err(|e| DecodeError::UnknownStatus(e.0))?;
    }

    let message: PushMessage = serde_json::from_value(value)?;
    match &message {
        PushMessage::Status { data } | PushMessage::Pong { data } => data.validate()?,
        PushMessage::Instruction { data } => data.validate()?,
        PushMessage::Log { .. } => {}
    }
    Ok(message)
}

/// Decode one frame sent by a display.
pub fn decode_client(raw: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let kind = message_type(&value)?;
    if kind != "ping" {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

fn message_type(value: &Value) -> Result<&str, DecodeError> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)
}

/// Encode an action submission as a request body.
pub fn encode_action(submission: &ActionSubmission) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(submission)
}

pub fn encode_client(message: &ClientMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

pub fn encode_push(message: &PushMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
