//! Core types for Raceline.
//!
//! This crate owns everything that crosses a wire: navigation instructions,
//! race status snapshots, the push-channel envelope and the action submission
//! sent back by the in-car console. It has no I/O of its own.

mod instruction;
mod message;
pub mod route;
mod status;

pub use instruction::{
    Action, ActionSubmission, Direction, Instruction, InvalidInstruction, StepId, StepParseError,
};
pub use message::{
    ApiReply, ClientMessage, DecodeError, PushMessage, decode_client, decode_push, encode_action,
    encode_client, encode_push,
};
pub use status::{InvalidSnapshot, RaceStatus, StatusSnapshot, UnknownStatus};

use std::fmt;

/// Push-channel connection lifecycle, as seen by a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connection attempt is outstanding.
    Connecting,
    /// The channel is open.
    Connected,
    /// The channel closed; a reconnection may be pending.
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
