//! Status state machine for the pilot dashboard.
//!
//! [`StatusMachine::apply`] turns a [`StatusSnapshot`] into [`UiEffects`], a
//! pure description of what the dashboard should show. Rejected snapshots
//! leave the machine untouched so the last rendered state stays on screen.

use raceline_core::{InvalidSnapshot, RaceStatus, StatusSnapshot};

/// Which race controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMatrix {
    pub start: bool,
    pub stop: bool,
    pub reset: bool,
}

impl ControlMatrix {
    pub const DISABLED: ControlMatrix = ControlMatrix {
        start: false,
        stop: false,
        reset: false,
    };

    pub fn for_status(status: RaceStatus) -> Self {
        match status {
            RaceStatus::Idle => ControlMatrix {
                start: true,
                stop: false,
                reset: true,
            },
            RaceStatus::Ready | RaceStatus::Driving => ControlMatrix {
                start: false,
                stop: true,
                reset: false,
            },
            RaceStatus::Completed => ControlMatrix {
                start: false,
                stop: false,
                reset: true,
            },
        }
    }
}

/// Everything a snapshot changes on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct UiEffects {
    pub status: RaceStatus,
    pub badge_text: String,
    pub badge_class: String,
    pub distance: String,
    pub counter: String,
    pub controls: ControlMatrix,
    /// Hide the loading indicator.
    pub dismiss_loading: bool,
    /// Reset position, trail, instruction panel and counters.
    pub reset_view: bool,
}

/// Why a snapshot was not rendered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusError {
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: RaceStatus, to: RaceStatus },
    #[error("distance went backwards from {from:.2} to {to:.2} km")]
    DistanceRegressed { from: f64, to: f64 },
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] InvalidSnapshot),
}

#[derive(Debug, Clone, Copy)]
struct Rendered {
    status: RaceStatus,
    km: f64,
}

/// Enforces the race lifecycle on what the backend pushes.
#[derive(Debug, Default, Clone)]
pub struct StatusMachine {
    rendered: Option<Rendered>,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status currently on screen, if any.
    pub fn current(&self) -> Option<RaceStatus> {
        self.rendered.map(|r| r.status)
    }

    /// Forget the rendered status so the next snapshot is accepted as is.
    ///
    /// Called on every (re)connection: transitions missed while the channel
    /// was down cannot be replayed.
    pub fn resync(&mut self) {
        self.rendered = None;
    }

    pub fn apply(&mut self, snapshot: &StatusSnapshot) -> Result<UiEffects, StatusError> {
        snapshot.validate()?;
        let next = snapshot.status;

        if let Some(prev) = self.rendered {
            if !prev.status.can_transition_to(next) {
                return Err(StatusError::IllegalTransition {
                    from: prev.status,
                    to: next,
                });
            }
            if next != RaceStatus::Idle && snapshot.total_km_travelled < prev.km {
                return Err(StatusError::DistanceRegressed {
                    from: prev.km,
                    to: snapshot.total_km_travelled,
                });
            }
        }

        let entering = self.current() != Some(next);
        self.rendered = Some(Rendered {
            status: next,
            km: snapshot.total_km_travelled,
        });

        Ok(UiEffects {
            status: next,
            badge_text: next.as_str().to_string(),
            badge_class: next.css_class(),
            distance: format_distance(snapshot.total_km_travelled),
            counter: format!(
                "{}/{}",
                snapshot.instructions_processed, snapshot.total_instructions
            ),
            controls: ControlMatrix::for_status(next),
            dismiss_loading: matches!(
                next,
                RaceStatus::Ready | RaceStatus::Driving | RaceStatus::Idle
            ),
            reset_view: entering && next == RaceStatus::Idle,
        })
    }
}

pub fn format_distance(km: f64) -> String {
    format!("{km:.2} km")
}
