//! Minimal striker: find the ball, run to it, kick it at the far goal

use crate::core::types::{Angle, Side};
use crate::protocol::command::Command;
use crate::policy::DecisionPolicy;
use crate::world::entity::EntityId;
use crate::world::snapshot::WorldSnapshot;

#[derive(Debug, Clone)]
pub struct ChaseBallPolicy {
    /// Ball readings below this confidence are treated as lost
    pub min_confidence: f64,
    /// Turn toward the ball when it is further off-axis than this (degrees)
    pub turn_threshold: f64,
    /// Distance at which the ball can be kicked (metres)
    pub kickable_distance: f64,
    pub dash_power: f64,
    pub kick_power: f64,
    /// Turn applied each firing while searching
    pub search_turn: f64,
}

impl Default for ChaseBallPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            turn_threshold: 10.0,
            kickable_distance: 0.7,
            dash_power: 80.0,
            kick_power: 100.0,
            search_turn: 60.0,
        }
    }
}

impl ChaseBallPolicy {
    /// Kick direction toward the opponent goal relative to the body
    fn kick_direction(&self, snapshot: &WorldSnapshot) -> f64 {
        let me = snapshot.me();
        let target = EntityId::goal(me.side().unwrap_or(Side::Left).opposite());

        // Sightings are relative to the head; only trust this cycle's
        let seen = snapshot
            .sighting(&target)
            .filter(|s| s.time == snapshot.time())
            .and_then(|s| s.direction);
        if let Some(direction) = seen {
            let neck = me.body.as_ref().and_then(|b| b.head_angle).unwrap_or(0.0);
            return (direction + Angle::new(neck)).degrees();
        }

        match (me.position, me.body_facing.or(me.head_facing)) {
            (Some(position), Some(facing)) => {
                let goal = snapshot
                    .get(&target)
                    .and_then(|e| e.position)
                    .map(|p| p.value);
                goal.map_or(0.0, |goal| {
                    facing
                        .value
                        .delta(Angle::bearing(position.value, goal))
                        .degrees()
                })
            }
            _ => 0.0,
        }
    }
}

impl DecisionPolicy for ChaseBallPolicy {
    fn decide(&self, snapshot: &WorldSnapshot) -> Vec<Command> {
        let ball = snapshot.ball();
        let direction = ball
            .and_then(|b| b.direction)
            .filter(|d| d.confidence >= self.min_confidence);
        let distance = ball
            .and_then(|b| b.distance)
            .filter(|d| d.confidence >= self.min_confidence);

        let Some(direction) = direction else {
            return vec![Command::Turn {
                moment: self.search_turn,
            }];
        };
        let direction = direction.value.degrees();

        if distance.is_some_and(|d| d.value <= self.kickable_distance) {
            return vec![Command::Kick {
                power: self.kick_power,
                direction: self.kick_direction(snapshot),
            }];
        }
        if direction.abs() > self.turn_threshold {
            return vec![Command::Turn { moment: direction }];
        }
        vec![Command::Dash {
            power: self.dash_power,
            direction: None,
        }]
    }
}
