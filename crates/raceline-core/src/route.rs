//! Built-in demo route through Grenoble, used when no engine feed is wired.

use crate::{Action, Instruction, StepId};

fn waypoint(
    n: u64,
    action: Action,
    target: &str,
    km_gain: f64,
    (latitude, longitude): (f64, f64),
) -> Instruction {
    let mut instruction = Instruction::new(action, target, StepId::from(n))
        .with_km_gain(km_gain)
        .with_position(latitude, longitude);
    instruction.id = Some(StepId::from(n));
    instruction.kind = Some("instruction".to_string());
    instruction
}

/// Place Grenette to the ENSIMAG campus, six steps, 1.0 km.
pub fn grenoble() -> Vec<Instruction> {
    vec![
        waypoint(1, Action::Start, "Départ - Place Grenette", 0.0, (45.1885, 5.7245)),
        waypoint(2, Action::GoForward, "Rue de la République", 0.2, (45.1895, 5.7255)),
        waypoint(3, Action::TurnRight, "Boulevard Edouard Rey", 0.15, (45.1905, 5.7265)),
        waypoint(4, Action::GoForward, "Avenue Alsace Lorraine", 0.3, (45.1920, 5.7280)),
        waypoint(5, Action::TurnLeft, "Campus ENSIMAG", 0.25, (45.1935, 5.7295)),
        waypoint(6, Action::Arrival, "Arrivée - ENSIMAG", 0.1, (45.1945, 5.7305)),
    ]
}
