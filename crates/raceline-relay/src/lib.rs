//! Stateless relay between the in-car console and the race engine.
//!
//! `POST /api/action` confirms the echoed step upstream and answers with the
//! next instruction, `GET /api/instruction` fetches without confirming and
//! `POST /api/ready` is passed straight through. An engine with nothing left
//! to give is reported as `{"action":"finish"}` on both instruction paths.

pub mod config;
pub mod proxy;
pub mod server;
pub mod upstream;

pub use config::{ConfigError, RelayConfig};
pub use proxy::{Relay, RelayError, Relayed, resolve_next};
pub use server::{router, serve};
pub use upstream::{Checkpoint, HttpUpstream, Upstream, UpstreamError};
