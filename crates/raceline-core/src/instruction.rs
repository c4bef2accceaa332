//! Navigation instructions and the action a driver submits to confirm one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The maneuver an instruction asks for.
///
/// Serialized as a plain string. Values the engine may add later are kept
/// verbatim in [`Action::Other`] so they can be relayed untouched and surfaced
/// as errors by the console instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Start,
    GoForward,
    TurnLeft,
    TurnRight,
    Arrival,
    /// No further instructions. Terminal.
    Finish,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Start => "start",
            Action::GoForward => "go_forward",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Arrival => "arrival",
            Action::Finish => "finish",
            Action::Other(other) => other,
        }
    }

    /// Whether this action ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Finish)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "start" => Action::Start,
            "go_forward" => Action::GoForward,
            "turn_left" => Action::TurnLeft,
            "turn_right" => Action::TurnRight,
            "arrival" => Action::Arrival,
            "finish" => Action::Finish,
            _ => Action::Other(s),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checkpoint key of an instruction.
///
/// The engine emits steps either as JSON strings or numbers; both are accepted
/// and always re-emitted as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StepRepr", into = "String")]
pub struct StepId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum StepRepr {
    Text(String),
    Number(serde_json::Number),
}

impl StepId {
    pub fn new(step: impl Into<String>) -> Result<Self, StepParseError> {
        let step = step.into();
        if step.trim().is_empty() {
            return Err(StepParseError::Empty);
        }
        Ok(Self(step))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for StepId {
    fn from(step: u64) -> Self {
        Self(step.to_string())
    }
}

impl TryFrom<StepRepr> for StepId {
    type Error = StepParseError;

    fn try_from(repr: StepRepr) -> Result<Self, Self::Error> {
        match repr {
            StepRepr::Text(text) => Self::new(text),
            StepRepr::Number(n) => Self::new(n.to_string()),
        }
    }
}

impl From<StepId> for String {
    fn from(step: StepId) -> Self {
        step.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error parsing a step identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepParseError {
    #[error("step identifier cannot be empty")]
    Empty,
}

/// An instruction that decodes but cannot be shown.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInstruction {
    #[error("km_gain must be non-negative, got {0}")]
    NegativeKmGain(f64),
    #[error("finish instruction cannot carry a target or coordinates")]
    DecoratedFinish,
}

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub km_gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StepId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Fields this crate does not model, kept so relays stay verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Instruction {
    /// A positional instruction with the given step.
    pub fn new(action: Action, target: impl Into<String>, step: StepId) -> Self {
        Self {
            action,
            target: Some(target.into()),
            latitude: None,
            longitude: None,
            km_gain: None,
            step: Some(step),
            id: None,
            kind: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The terminal sentinel: `{"action":"finish"}` and nothing else.
    pub fn finish() -> Self {
        Self {
            action: Action::Finish,
            target: None,
            latitude: None,
            longitude: None,
            km_gain: None,
            step: None,
            id: None,
            kind: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_km_gain(mut self, km_gain: f64) -> Self {
        self.km_gain = Some(km_gain);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.action.is_terminal()
    }

    /// Distance credited for completing this step.
    pub fn km_gain(&self) -> f64 {
        self.km_gain.unwrap_or(0.0)
    }

    /// Coordinates, only when both halves are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Key used to confirm this step upstream.
    ///
    /// Prefers `step`; engines that only number their instructions through
    /// `id` fall back to it.
    pub fn checkpoint_key(&self) -> Option<&StepId> {
        self.step.as_ref().or(self.id.as_ref())
    }

    /// Check the invariants the wire format alone cannot express.
    pub fn validate(&self) -> Result<(), InvalidInstruction> {
        if let Some(km) = self.km_gain
            && !(km >= 0.0)
        {
            return Err(InvalidInstruction::NegativeKmGain(km));
        }
        if self.is_terminal()
            && (self.target.is_some() || self.latitude.is_some() || self.longitude.is_some())
        {
            return Err(InvalidInstruction::DecoratedFinish);
        }
        Ok(())
    }
}

/// The control a driver confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Forward,
}

impl Direction {
    /// The confirmation an action expects, if it expects one at all.
    pub fn expected_for(action: &Action) -> Option<Self> {
        match action {
            Action::GoForward => Some(Direction::Forward),
            Action::TurnLeft => Some(Direction::Left),
            Action::TurnRight => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the in-car console posts to confirm a step.
///
/// The echoed `instruction` is what the relay checkpoints; the console never
/// asserts a step counter of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSubmission {
    pub action: Direction,
    pub instruction: Instruction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_action_is_kept_verbatim() {
        let instruction: Instruction =
            serde_json::from_value(json!({"action": "u_turn", "target": "Quai", "step": 3}))
                .unwrap();
        assert_eq!(instruction.action, Action::Other("u_turn".to_string()));
        assert_eq!(serde_json::to_value(&instruction).unwrap()["action"], "u_turn");
    }

    #[test]
    fn step_accepts_numbers_and_strings() {
        let numeric: Instruction =
            serde_json::from_value(json!({"action": "go_forward", "step": 4})).unwrap();
        let text: Instruction =
            serde_json::from_value(json!({"action": "go_forward", "step": "4"})).unwrap();
        assert_eq!(numeric.step, text.step);
        assert_eq!(serde_json::to_value(&numeric).unwrap()["step"], "4");
    }

    #[test]
    fn empty_step_is_rejected() {
        let result: Result<Instruction, _> =
            serde_json::from_value(json!({"action": "go_forward", "step": " "}));
        assert!(result.is_err());
    }

    #[test]
    fn finish_sentinel_serializes_bare() {
        assert_eq!(
            serde_json::to_value(Instruction::finish()).unwrap(),
            json!({"action": "finish"})
        );
    }

    #[test]
    fn unknown_fields_survive() {
        let raw = json!({
            "id": "2",
            "type": "instruction",
            "action": "go_forward",
            "target": "Rue de la République",
            "km_gain": 0.2,
            "latitude": 45.1895,
            "longitude": 5.7255,
            "lane": 2
        });
        let instruction: Instruction = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(instruction.extra.get("lane"), Some(&json!(2)));
        assert_eq!(serde_json::to_value(&instruction).unwrap(), raw);
    }

    #[test]
    fn checkpoint_key_falls_back_to_id() {
        let instruction: Instruction =
            serde_json::from_value(json!({"action": "turn_left", "id": "5"})).unwrap();
        assert_eq!(instruction.checkpoint_key().map(StepId::as_str), Some("5"));
    }

    #[test]
    fn validate_rejects_negative_gain_and_dressed_finish() {
        let step = StepId::from(1);
        let negative = Instruction::new(Action::GoForward, "Rue X", step).with_km_gain(-0.5);
        assert_eq!(negative.validate(), Err(InvalidInstruction::NegativeKmGain(-0.5)));

        let mut finish = Instruction::finish();
        finish.target = Some("Arrivée".to_string());
        assert_eq!(finish.validate(), Err(InvalidInstruction::DecoratedFinish));
        assert!(Instruction::finish().validate().is_ok());
    }

    #[test]
    fn forward_submission_uses_literal_forward() {
        let submission = ActionSubmission {
            action: Direction::expected_for(&Action::GoForward).unwrap(),
            instruction: Instruction::new(Action::GoForward, "Rue X", StepId::from(2)),
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["action"], "forward");
        assert_eq!(value["instruction"]["step"], "2");
    }
}
