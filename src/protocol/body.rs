//! `sense_body` decoding

use serde::Serialize;

use crate::core::error::FieldError;
use crate::core::types::Cycle;
use crate::protocol::scan::{group_inner, take_atom, top_level_spans};

/// Counters the server increments for each executed command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandCounts {
    pub kick: u32,
    pub dash: u32,
    pub turn: u32,
    pub turn_neck: u32,
    pub say: u32,
    pub catch: u32,
    pub moves: u32,
    pub change_view: u32,
}

/// Proprioceptive state reported once per cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BodyState {
    pub time: Cycle,
    pub view_quality: Option<String>,
    pub view_width: Option<String>,
    pub stamina: Option<f64>,
    pub effort: Option<f64>,
    pub speed: Option<f64>,
    pub speed_direction: Option<f64>,
    /// Neck angle relative to the body; see-directions are relative to the head
    pub head_angle: Option<f64>,
    pub counts: CommandCounts,
}

/// Decode the records following `(sense_body TIME`
///
/// Unknown sub-records such as `(arm ...)` or `(focus ...)` are skipped.
pub fn parse_body_state(time: Cycle, body: &str) -> (BodyState, Vec<FieldError>) {
    let mut state = BodyState {
        time,
        ..Default::default()
    };
    let mut errors = Vec::new();

    for span in top_level_spans(body) {
        let inner = group_inner(span.slice(body));
        let Some((name, rest)) = take_atom(inner) else {
            continue;
        };
        let args: Vec<&str> = rest.split_whitespace().collect();
        let mut number = |field: &'static str, idx: usize| -> Option<f64> {
            let token = args.get(idx)?;
            match token.parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    errors.push(FieldError::InvalidNumber {
                        field,
                        token: token.to_string(),
                    });
                    None
                }
            }
        };

        match name {
            "view_mode" => {
                state.view_quality = args.first().map(|s| s.to_string());
                state.view_width = args.get(1).map(|s| s.to_string());
            }
            "stamina" => {
                state.stamina = number("stamina", 0);
                state.effort = number("effort", 1);
            }
            "speed" => {
                state.speed = number("speed", 0);
                state.speed_direction = number("speed_direction", 1);
            }
            "head_angle" => state.head_angle = number("head_angle", 0),
            "kick" | "dash" | "turn" | "turn_neck" | "say" | "catch" | "move" | "change_view" => {
                let count = number("count", 0).map(|v| v.max(0.0) as u32).unwrap_or(0);
                let counts = &mut state.counts;
                match name {
                    "kick" => counts.kick = count,
                    "dash" => counts.dash = count,
                    "turn" => counts.turn = count,
                    "turn_neck" => counts.turn_neck = count,
                    "say" => counts.say = count,
                    "catch" => counts.catch = count,
                    "move" => counts.moves = count,
                    _ => counts.change_view = count,
                }
            }
            _ => {}
        }
    }

    (state, errors)
}
