//! Instruction/confirmation workflow of the in-car console.
//!
//! ```text
//! AwaitingStart -> Polling -> AwaitingAction -> Submitting -> AwaitingAction ... -> Finished
//!                     ^             |                |
//!                     |             +-- (unknown action) --> Faulted --(ack)--+
//!                     |                  (unreadable reply) ----^             |
//!                     +-------------------------------------------------------+
//! ```
//!
//! `Finished` has no outgoing edge. While a choice is pending no other
//! instruction is accepted.

use raceline_core::{Action, ActionSubmission, Direction, Instruction};

/// A console control the driver can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Left,
    Right,
    Forward,
}

impl Control {
    /// The direction submitted when this control is activated.
    ///
    /// `Forward` submits the literal forward indicator; the relay checks the
    /// submitted action against the instruction's expected one.
    pub fn direction(self) -> Direction {
        match self {
            Control::Left => Direction::Left,
            Control::Right => Direction::Right,
            Control::Forward => Direction::Forward,
        }
    }

    fn for_action(action: &Action) -> Option<Self> {
        Direction::expected_for(action).map(|direction| match direction {
            Direction::Left => Control::Left,
            Direction::Right => Control::Right,
            Direction::Forward => Control::Forward,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    Polling,
    AwaitingAction(Control),
    Submitting(Control),
    Faulted,
    Finished,
}

/// What a rendered instruction asks of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendered {
    Actionable(Control),
    Finished,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("the race is finished")]
    Finished,
    #[error("the session has not started")]
    NotStarted,
    #[error("the session is already running")]
    AlreadyStarted,
    #[error("a confirmation is still pending for {0}")]
    ChoicePending(String),
    #[error("unsupported instruction action: {0}")]
    UnsupportedAction(Action),
    #[error("{0:?} is not actionable")]
    NotActionable(Control),
    #[error("no fault to acknowledge")]
    NotFaulted,
}

/// What the console shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleView {
    pub action_label: String,
    pub target: String,
    pub actionable: Option<Control>,
    pub finished: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    phase: Phase,
    last: Option<Instruction>,
    view: ConsoleView,
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingStart,
            last: None,
            view: ConsoleView::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> &ConsoleView {
        &self.view
    }

    /// The last instruction received, echoed on submission.
    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.last.as_ref()
    }

    /// Whether the poller may fetch now.
    pub fn should_poll(&self) -> bool {
        self.phase == Phase::Polling
    }

    /// Begin polling once the driver confirmed the start.
    pub fn start(&mut self) -> Result<(), WorkflowError> {
        match self.phase {
            Phase::AwaitingStart => {
                self.phase = Phase::Polling;
                Ok(())
            }
            Phase::Finished => Err(WorkflowError::Finished),
            _ => Err(WorkflowError::AlreadyStarted),
        }
    }

    /// Show an instruction received from a poll or as an action response.
    pub fn render(&mut self, instruction: Instruction) -> Result<Rendered, WorkflowError> {
        match self.phase {
            Phase::Finished => return Err(WorkflowError::Finished),
            Phase::AwaitingStart => return Err(WorkflowError::NotStarted),
            Phase::AwaitingAction(_) | Phase::Faulted => {
                let pending = self
                    .last
                    .as_ref()
                    .and_then(Instruction::checkpoint_key)
                    .map(|step| format!("step {step}"))
                    .unwrap_or_else(|| "the current instruction".to_string());
                return Err(WorkflowError::ChoicePending(pending));
            }
            Phase::Polling | Phase::Submitting(_) => {}
        }

        self.view.action_label = action_label(&instruction.action);
        self.view.target = instruction.target.clone().unwrap_or_default();
        self.view.actionable = None;

        if instruction.is_terminal() {
            self.phase = Phase::Finished;
            self.view.finished = true;
            self.view.error = None;
            self.last = Some(instruction);
            return Ok(Rendered::Finished);
        }

        match Control::for_action(&instruction.action) {
            Some(control) => {
                self.phase = Phase::AwaitingAction(control);
                self.view.actionable = Some(control);
                self.view.error = None;
                self.last = Some(instruction);
                Ok(Rendered::Actionable(control))
            }
            None => {
                let action = instruction.action.clone();
                self.phase = Phase::Faulted;
                self.view.error = Some(format!("Unsupported instruction: {action}"));
                self.last = Some(instruction);
                Err(WorkflowError::UnsupportedAction(action))
            }
        }
    }

    /// Activate a control; returns the submission to send.
    pub fn activate(&mut self, control: Control) -> Result<ActionSubmission, WorkflowError> {
        match self.phase {
            Phase::AwaitingAction(expected) if expected == control => {}
            Phase::Finished => return Err(WorkflowError::Finished),
            _ => return Err(WorkflowError::NotActionable(control)),
        }
        let instruction = self
            .last
            .clone()
            .ok_or(WorkflowError::NotActionable(control))?;
        self.phase = Phase::Submitting(control);
        self.view.actionable = None;
        Ok(ActionSubmission {
            action: control.direction(),
            instruction,
        })
    }

    /// The submission did not go through; re-arm the same control.
    pub fn submission_failed(&mut self, reason: impl Into<String>) {
        if let Phase::Submitting(control) = self.phase {
            self.phase = Phase::AwaitingAction(control);
            self.view.actionable = Some(control);
            self.view.error = Some(reason.into());
        }
    }

    /// An instruction fetch failed; show why until the next render.
    pub fn fetch_failed(&mut self, reason: impl Into<String>) {
        if self.phase == Phase::Polling {
            self.view.error = Some(reason.into());
        }
    }

    /// A reply arrived that is not an instruction at all. Fault until the
    /// driver acknowledges; nothing is echoed back for it.
    pub fn reject(&mut self, reason: impl Into<String>) {
        if matches!(self.phase, Phase::Polling | Phase::Submitting(_)) {
            self.phase = Phase::Faulted;
            self.view.actionable = None;
            self.view.error = Some(reason.into());
        }
    }

    /// Clear a fault and resume polling.
    pub fn acknowledge_fault(&mut self) -> Result<(), WorkflowError> {
        if self.phase != Phase::Faulted {
            return Err(WorkflowError::NotFaulted);
        }
        self.phase = Phase::Polling;
        self.view.error = None;
        Ok(())
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

/// `go_forward` -> `Go forward`.
fn action_label(action: &Action) -> String {
    let text = action.as_str().replace('_', " ");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}
