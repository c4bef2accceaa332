//! Pilot dashboard view state.
//!
//! [`PilotView`] is a plain value. The only writer is [`Dashboard`], which
//! feeds push events through the [`StatusMachine`] and folds REST call results
//! in; message handlers never touch the view directly.

use crate::connection::PushEvent;
use crate::dashboard::{ApiReply, Operation};
use crate::status::{ControlMatrix, StatusMachine, UiEffects, format_distance};
use crate::ClientError;
use raceline_core::{Action, ConnectionState, Instruction, PushMessage, StatusSnapshot};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Place Grenette, Grenoble.
pub const START_POSITION: (f64, f64) = (45.1885, 5.7245);
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
}

/// The "current instruction" panel.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionCard {
    pub icon: &'static str,
    pub title: String,
    pub target: String,
    pub km_gain: String,
}

impl InstructionCard {
    fn from_instruction(instruction: &Instruction) -> Self {
        let icon = match instruction.action {
            Action::Start => "🏁",
            Action::GoForward => "⬆️",
            Action::TurnLeft => "⬅️",
            Action::TurnRight => "➡️",
            Action::Arrival => "🎯",
            _ => "📍",
        };
        Self {
            icon,
            title: instruction.action.as_str().replace('_', " ").to_uppercase(),
            target: instruction.target.clone().unwrap_or_default(),
            km_gain: format!("+{} km", instruction.km_gain()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PilotView {
    pub connection: ConnectionState,
    pub badge_text: String,
    pub badge_class: String,
    pub distance: String,
    pub counter: String,
    pub controls: ControlMatrix,
    /// Loading indicator message, when shown.
    pub loading: Option<String>,
    pub position: (f64, f64),
    pub trail: Vec<(f64, f64)>,
    pub instruction: Option<InstructionCard>,
    pub connectivity: Option<String>,
    pub logs: VecDeque<LogEntry>,
    /// Entries ever logged, dropped ones included.
    pub logged: u64,
}

impl PilotView {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Connecting,
            badge_text: "—".to_string(),
            badge_class: "status-unknown".to_string(),
            distance: format_distance(0.0),
            counter: "0/0".to_string(),
            controls: ControlMatrix::DISABLED,
            loading: Some("Initializing".to_string()),
            position: START_POSITION,
            trail: Vec::new(),
            instruction: None,
            connectivity: None,
            logs: VecDeque::new(),
            logged: 0,
        }
    }

    pub fn log(&mut self, level: LogLevel, text: impl Into<String>) {
        self.logs.push_back(LogEntry {
            level,
            text: text.into(),
        });
        self.logged += 1;
        while self.logs.len() > LOG_CAPACITY {
            self.logs.pop_front();
        }
    }

    fn apply_effects(&mut self, effects: &UiEffects) {
        if effects.reset_view {
            self.reset();
        }
        self.badge_text = effects.badge_text.clone();
        self.badge_class = effects.badge_class.clone();
        self.distance = effects.distance.clone();
        self.counter = effects.counter.clone();
        self.controls = effects.controls;
        if effects.dismiss_loading {
            self.loading = None;
        }
    }

    /// Back to the pre-race view. Logs are kept.
    fn reset(&mut self) {
        self.position = START_POSITION;
        self.trail.clear();
        self.instruction = None;
        self.distance = format_distance(0.0);
        self.counter = "0/0".to_string();
        self.connectivity = None;
    }

    /// Entries logged after the first `seen`, oldest first.
    pub fn logs_since(&self, seen: u64) -> impl Iterator<Item = &LogEntry> {
        let fresh = self.logged.saturating_sub(seen).min(self.logs.len() as u64) as usize;
        self.logs.iter().skip(self.logs.len() - fresh)
    }

    fn record_instruction(&mut self, instruction: &Instruction) {
        if let Some(position) = instruction.position() {
            self.position = position;
            self.trail.push(position);
        }
        self.instruction = Some(InstructionCard::from_instruction(instruction));
        self.loading = None;
        self.log(
            LogLevel::Info,
            format!(
                "{}: {}",
                instruction.action,
                instruction.target.as_deref().unwrap_or("")
            ),
        );
    }
}

impl Default for PilotView {
    fn default() -> Self {
        Self::new()
    }
}

/// Reducer owning the pilot view and its status machine.
#[derive(Debug, Default)]
pub struct Dashboard {
    view: PilotView,
    status: StatusMachine,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &PilotView {
        &self.view
    }

    pub fn status(&self) -> &StatusMachine {
        &self.status
    }

    pub fn handle(&mut self, event: PushEvent) {
        match event {
            PushEvent::Connection(state) => self.on_connection(state),
            PushEvent::Message(PushMessage::Status { data } | PushMessage::Pong { data }) => {
                self.on_snapshot(&data)
            }
            PushEvent::Message(PushMessage::Instruction { data }) => {
                self.view.record_instruction(&data)
            }
            PushEvent::Message(PushMessage::Log { message }) => {
                self.view.log(LogLevel::Info, message)
            }
        }
    }

    fn on_connection(&mut self, state: ConnectionState) {
        let previous = std::mem::replace(&mut self.view.connection, state);
        match state {
            ConnectionState::Connected => {
                self.status.resync();
                self.view.loading = None;
                self.view.log(LogLevel::Success, "Push channel connected");
            }
            ConnectionState::Disconnected if previous == ConnectionState::Connected => {
                self.view.log(LogLevel::Error, "Push channel closed");
            }
            _ => {}
        }
    }

    fn on_snapshot(&mut self, snapshot: &StatusSnapshot) {
        match self.status.apply(snapshot) {
            Ok(effects) => {
                debug!(status = %effects.status, "status rendered");
                self.view.apply_effects(&effects);
            }
            Err(e) => warn!("status snapshot rejected: {e}"),
        }
    }

    /// Mark a REST call as in flight: its control is disabled meanwhile.
    pub fn begin(&mut self, operation: Operation) {
        match operation {
            Operation::StartRace => {
                self.view.controls.start = false;
                self.view.loading = Some("Starting race".to_string());
            }
            Operation::Stop => self.view.controls.stop = false,
            Operation::Reset => {
                self.view.controls.reset = false;
                self.view.loading = Some("Resetting".to_string());
            }
            Operation::TestConnectivity => {
                self.view.connectivity = Some("Testing".to_string());
            }
            Operation::Status => {}
        }
    }

    /// Fold a REST call result into the view.
    ///
    /// Whatever happened, the controls are re-derived from the last rendered
    /// status so no button stays disabled without feedback.
    pub fn finish(&mut self, operation: Operation, result: Result<ApiReply, ClientError>) {
        self.view.loading = None;
        match result {
            Ok(reply) => {
                let level = if reply.success {
                    LogLevel::Success
                } else {
                    LogLevel::Error
                };
                if operation == Operation::Reset && reply.success {
                    self.view.reset();
                }
                if operation == Operation::TestConnectivity {
                    self.view.connectivity = Some(
                        if reply.success {
                            "Connectivity OK"
                        } else {
                            "Connectivity failed"
                        }
                        .to_string(),
                    );
                }
                self.view.log(level, reply.message);
            }
            Err(e) => {
                warn!(operation = operation.as_str(), "{e}");
                if operation == Operation::TestConnectivity {
                    self.view.connectivity = Some("Test error".to_string());
                }
                self.view.log(LogLevel::Error, e.to_string());
                let level = if e.is_timeout() {
                    LogLevel::Warning
                } else {
                    LogLevel::Info
                };
                self.view.log(level, e.remedy());
            }
        }
        self.view.controls = self
            .status
            .current()
            .map(ControlMatrix::for_status)
            .unwrap_or(ControlMatrix::DISABLED);
    }
}
