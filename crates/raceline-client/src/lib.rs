//! Display-side clients for Raceline.
//!
//! Two display surfaces live here. The pilot dashboard keeps a push channel
//! open ([`PushClient`]), runs every status snapshot through the
//! [`StatusMachine`] and folds the result into a [`PilotView`]. The in-car
//! console polls the relay for instructions and submits the driver's choices
//! ([`CarConsole`] driving a [`Workflow`]).
//!
//! Both loops share the retry abstraction in [`retry`].

pub mod connection;
pub mod console;
pub mod dashboard;
mod error;
mod http;
pub mod relay;
pub mod retry;
pub mod status;
pub mod transport;
pub mod view;
pub mod workflow;

pub use connection::{Link, PushClient, PushConfig, PushEvent};
pub use console::{CarConsole, ConsoleError, Operator, Outcome, PollConfig};
pub use dashboard::{ApiReply, DashboardClient, DashboardConfig, Operation};
pub use error::{ClientError, TransportError};
pub use relay::{RelayApi, RelayClient};
pub use status::{ControlMatrix, StatusError, StatusMachine, UiEffects};
pub use transport::{Transport, WsTransport};
pub use view::{Dashboard, PilotView};
pub use workflow::{ConsoleView, Control, Workflow, WorkflowError};
