//! Race progress as reported by the pilot backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Race lifecycle.
///
/// Forward progress is `Idle -> Ready -> Driving -> Completed`. The only way
/// back to `Idle` is an explicit operator action (stop or reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RaceStatus {
    Idle,
    Ready,
    Driving,
    Completed,
}

impl RaceStatus {
    pub const ALL: [RaceStatus; 4] = [
        RaceStatus::Idle,
        RaceStatus::Ready,
        RaceStatus::Driving,
        RaceStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::Idle => "IDLE",
            RaceStatus::Ready => "READY",
            RaceStatus::Driving => "DRIVING",
            RaceStatus::Completed => "COMPLETED",
        }
    }

    /// Badge class used by the pilot dashboard.
    pub fn css_class(&self) -> String {
        format!("status-{}", self.as_str().to_lowercase())
    }

    /// Whether moving from `self` to `next` is a legal edge.
    ///
    /// Repeating the current status is always legal; pong replies echo the
    /// latest snapshot. Any status may return to `Idle`, which only happens
    /// on an explicit stop or reset.
    pub fn can_transition_to(&self, next: RaceStatus) -> bool {
        use RaceStatus::*;
        *self == next
            || matches!(
                (*self, next),
                (Idle, Ready) | (Ready, Driving) | (Driving, Completed) | (_, Idle)
            )
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RaceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A status string outside the four known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized race status: {0}")]
pub struct UnknownStatus(pub String);

/// Snapshot of race progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: RaceStatus,
    pub total_km_travelled: f64,
    pub instructions_processed: u32,
    pub total_instructions: u32,
    #[serde(default)]
    pub ready_sent: bool,
}

/// A snapshot whose counters contradict each other.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidSnapshot {
    #[error("{processed} instructions processed out of {total}")]
    ProcessedExceedsTotal { processed: u32, total: u32 },
    #[error("distance travelled must be non-negative, got {0}")]
    NegativeDistance(f64),
}

impl StatusSnapshot {
    /// The snapshot of a freshly reset session.
    pub fn idle(total_instructions: u32) -> Self {
        Self {
            status: RaceStatus::Idle,
            total_km_travelled: 0.0,
            instructions_processed: 0,
            total_instructions,
            ready_sent: false,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidSnapshot> {
        if self.instructions_processed > self.total_instructions {
            return Err(InvalidSnapshot::ProcessedExceedsTotal {
                processed: self.instructions_processed,
                total: self.total_instructions,
            });
        }
        if !(self.total_km_travelled >= 0.0) {
            return Err(InvalidSnapshot::NegativeDistance(self.total_km_travelled));
        }
        Ok(())
    }
}
