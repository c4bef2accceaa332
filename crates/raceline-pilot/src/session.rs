//! The single in-memory race session.

use raceline_core::{Instruction, RaceStatus, StatusSnapshot};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("race already started; reset before starting again")]
    AlreadyStarted,
    #[error("cannot go from {from} to {to}")]
    IllegalTransition { from: RaceStatus, to: RaceStatus },
}

/// What one feed tick produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Instruction(Instruction),
    /// The route is exhausted; the session is now COMPLETED.
    Completed,
    /// The feed that asked belongs to a stopped run.
    Stale,
}

#[derive(Debug, Clone)]
pub struct RaceSession {
    status: RaceStatus,
    ready_sent: bool,
    km_travelled: f64,
    processed: usize,
    route: Vec<Instruction>,
    /// Bumped on stop and reset so a running feed can tell it was cancelled.
    run: u64,
}

impl RaceSession {
    pub fn new(route: Vec<Instruction>) -> Self {
        Self {
            status: RaceStatus::Idle,
            ready_sent: false,
            km_travelled: 0.0,
            processed: 0,
            route,
            run: 0,
        }
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            total_km_travelled: self.km_travelled,
            instructions_processed: self.processed as u32,
            total_instructions: self.route.len() as u32,
            ready_sent: self.ready_sent,
        }
    }

    fn transition(&mut self, to: RaceStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(to) {
            return Err(SessionError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// IDLE -> READY. Only once per reset.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.ready_sent || self.status != RaceStatus::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.transition(RaceStatus::Ready)?;
        self.ready_sent = true;
        Ok(())
    }

    /// READY -> DRIVING.
    pub fn drive(&mut self) -> Result<(), SessionError> {
        if self.status != RaceStatus::Ready {
            return Err(SessionError::IllegalTransition {
                from: self.status,
                to: RaceStatus::Driving,
            });
        }
        self.transition(RaceStatus::Driving)
    }

    /// Hand out the next route step on behalf of feed `run`.
    pub fn advance(&mut self, run: u64) -> Step {
        if run != self.run || self.status != RaceStatus::Driving {
            return Step::Stale;
        }
        match self.route.get(self.processed).cloned() {
            Some(instruction) => {
                self.km_travelled += instruction.km_gain();
                self.processed += 1;
                Step::Instruction(instruction)
            }
            None => {
                self.status = RaceStatus::Completed;
                Step::Completed
            }
        }
    }

    /// Back to IDLE, keeping progress.
    pub fn stop(&mut self) {
        self.run += 1;
        self.status = RaceStatus::Idle;
    }

    /// Back to IDLE with progress zeroed.
    pub fn reset(&mut self) {
        self.stop();
        self.ready_sent = false;
        self.km_travelled = 0.0;
        self.processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raceline_core::route;

    #[test]
    fn full_route_accumulates_distance() {
        let mut session = RaceSession::new(route::grenoble());
        session.begin().unwrap();
        session.drive().unwrap();
        let run = session.run();

        let mut steps = 0;
        while let Step::Instruction(_) = session.advance(run) {
            steps += 1;
        }
        assert_eq!(steps, 6);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, RaceStatus::Completed);
        assert_eq!(snapshot.instructions_processed, 6);
        assert!((snapshot.total_km_travelled - 1.0).abs() < 1e-9);
        snapshot.validate().unwrap();
    }

    #[test]
    fn second_start_is_refused_until_reset() {
        let mut session = RaceSession::new(route::grenoble());
        session.begin().unwrap();
        assert_eq!(session.begin(), Err(SessionError::AlreadyStarted));

        session.stop();
        assert_eq!(session.status(), RaceStatus::Idle);
        assert_eq!(session.begin(), Err(SessionError::AlreadyStarted));

        session.reset();
        assert!(session.begin().is_ok());
    }

    #[test]
    fn stop_invalidates_the_running_feed() {
        let mut session = RaceSession::new(route::grenoble());
        session.begin().unwrap();
        session.drive().unwrap();
        let run = session.run();
        assert!(matches!(session.advance(run), Step::Instruction(_)));

        session.stop();
        assert_eq!(session.advance(run), Step::Stale);
        assert_eq!(session.snapshot().instructions_processed, 1);
    }

    #[test]
    fn reset_zeroes_progress() {
        let mut session = RaceSession::new(route::grenoble());
        session.begin().unwrap();
        session.drive().unwrap();
        session.advance(session.run());
        session.advance(session.run());
        session.reset();
        let snapshot = session.snapshot();
        assert_eq!(snapshot, StatusSnapshot::idle(6));
    }

    #[test]
    fn drive_requires_ready() {
        let mut session = RaceSession::new(route::grenoble());
        assert_eq!(
            session.drive(),
            Err(SessionError::IllegalTransition {
                from: RaceStatus::Idle,
                to: RaceStatus::Driving
            })
        );
    }
}
