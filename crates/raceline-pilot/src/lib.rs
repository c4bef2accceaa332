//! Pilot server for Raceline.
//!
//! Owns the one race session, replays the instruction feed and pushes every
//! change to the connected dashboards over `/ws`.

pub mod pilot;
pub mod server;
pub mod session;

pub use pilot::{Pilot, PilotConfig};
pub use server::{router, serve};
pub use session::{RaceSession, SessionError, Step};
