//! In-car console: drives a [`Workflow`] against the relay.

use crate::ClientError;
use crate::relay::RelayApi;
use crate::retry::{Backoff, RetryPolicy};
use crate::workflow::{ConsoleView, Control, Phase, Rendered, Workflow, WorkflowError};
use raceline_core::Instruction;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each instruction fetch, and between failed fetches.
    pub interval: Duration,
}

impl PollConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::Fixed(self.interval)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

/// Driver input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Confirm the session start.
    Start,
    Control(Control),
    AcknowledgeFault,
}

/// Why [`CarConsole::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    OperatorGone,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

pub struct CarConsole<R> {
    relay: R,
    config: PollConfig,
    workflow: Workflow,
    view: watch::Sender<ConsoleView>,
    /// Failed fetches since the last instruction arrived.
    backoff: Backoff,
    /// When the next fetch is due; operator input does not move it.
    poll_at: Option<Instant>,
}

impl<R: RelayApi> CarConsole<R> {
    pub fn new(relay: R, config: PollConfig) -> (Self, watch::Receiver<ConsoleView>) {
        let (view, rx) = watch::channel(ConsoleView::default());
        let console = Self {
            relay,
            config,
            workflow: Workflow::new(),
            view,
            backoff: Backoff::new(config.retry_policy()),
            poll_at: None,
        };
        (console, rx)
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Put the engine into an active session and begin polling.
    pub async fn start(&mut self) -> Result<(), ConsoleError> {
        match self.workflow.phase() {
            Phase::AwaitingStart => {}
            Phase::Finished => return Err(WorkflowError::Finished.into()),
            _ => return Err(WorkflowError::AlreadyStarted.into()),
        }
        let ack = self.relay.ready().await?;
        debug!(%ack, "engine ready");
        self.workflow.start()?;
        info!("session started, polling for instructions");
        self.publish();
        Ok(())
    }

    /// Poll, render and submit until the race finishes or the operator
    /// channel closes.
    ///
    /// Operator input only ever interrupts the wait before a fetch. Once the
    /// request is sent it runs to completion and input queues behind it, since
    /// the engine hands each step out once.
    pub async fn run(&mut self, operator: &mut mpsc::Receiver<Operator>) -> Outcome {
        loop {
            if self.workflow.phase() == Phase::Finished {
                return Outcome::Finished;
            }
            let wake = if self.workflow.should_poll() {
                let deadline = match self.poll_at {
                    Some(at) => at,
                    None => {
                        let at = Instant::now() + self.next_wait();
                        self.poll_at = Some(at);
                        at
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        self.poll_at = None;
                        Wake::Fetched(self.relay.next_instruction().await)
                    }
                    input = operator.recv() => Wake::Operator(input),
                }
            } else {
                self.poll_at = None;
                Wake::Operator(operator.recv().await)
            };
            match wake {
                Wake::Fetched(Ok(instruction)) => {
                    self.backoff.reset();
                    self.show(instruction);
                }
                Wake::Fetched(Err(e)) => self.fetch_failed(e),
                Wake::Operator(Some(input)) => self.operate(input).await,
                Wake::Operator(None) => return Outcome::OperatorGone,
            }
        }
    }

    /// One poll interval, or the retry delay after a failed fetch.
    fn next_wait(&self) -> Duration {
        match self.backoff.failures() {
            0 => self.config.interval,
            n => self.config.retry_policy().delay(n - 1),
        }
    }

    fn fetch_failed(&mut self, e: ClientError) {
        if e.is_undecodable() {
            self.backoff.reset();
            self.unreadable(e);
            return;
        }
        self.backoff.next_delay();
        warn!(
            failures = self.backoff.failures(),
            "instruction fetch failed: {e}"
        );
        self.workflow
            .fetch_failed(format!("{e} ({})", e.remedy()));
        self.publish();
    }

    async fn operate(&mut self, input: Operator) {
        match input {
            Operator::Start => {
                if let Err(e) = self.start().await {
                    warn!("session start failed: {e}");
                }
            }
            Operator::AcknowledgeFault => match self.workflow.acknowledge_fault() {
                Ok(()) => info!("fault acknowledged, polling resumed"),
                Err(e) => debug!("{e}"),
            },
            Operator::Control(control) => self.confirm(control).await,
        }
        self.publish();
    }

    async fn confirm(&mut self, control: Control) {
        let submission = match self.workflow.activate(control) {
            Ok(submission) => submission,
            Err(e) => {
                debug!(?control, "input ignored: {e}");
                return;
            }
        };
        self.publish();
        match self.relay.submit(&submission).await {
            Ok(next) => self.show(next),
            Err(e) if e.is_undecodable() => self.unreadable(e),
            Err(e) => {
                warn!(?control, "action submission failed: {e}");
                self.workflow
                    .submission_failed(format!("{e} ({})", e.remedy()));
            }
        }
    }

    /// Retrying would hand out the next step unseen, so stop and wait for
    /// the driver instead.
    fn unreadable(&mut self, e: ClientError) {
        warn!("unreadable instruction, waiting for acknowledgement: {e}");
        self.workflow.reject(format!("Unreadable instruction: {e}"));
        self.publish();
    }

    fn show(&mut self, instruction: Instruction) {
        let action = instruction.action.clone();
        match self.workflow.render(instruction) {
            Ok(Rendered::Finished) => info!("race finished"),
            Ok(Rendered::Actionable(control)) => {
                info!(%action, ?control, "instruction awaiting confirmation")
            }
            Err(e) => warn!("instruction not rendered: {e}"),
        }
        self.publish();
    }

    fn publish(&self) {
        self.view.send_replace(self.workflow.view().clone());
    }
}

enum Wake {
    Fetched(Result<Instruction, ClientError>),
    Operator(Option<Operator>),
}
