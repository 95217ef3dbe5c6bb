//! Tracked objects

use crate::core::error::RegistryRejection;
use crate::core::types::{Angle, Cycle, Point2, Side};
use crate::protocol::object_id::ObjectId;
use crate::world::estimate::Estimate;

/// Stable registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    Ball,
    /// Canonical landmark name, e.g. `"g r"` or `"f p l t"`
    Landmark(String),
    Player { team: String, number: u8 },
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Ball => write!(f, "b"),
            EntityId::Landmark(name) => write!(f, "{}", name),
            EntityId::Player { team, number } => write!(f, "p \"{}\" {}", team, number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Landmark,
    Ball,
    Player { goalie: bool },
}

impl EntityId {
    pub fn landmark(name: impl Into<String>) -> Self {
        EntityId::Landmark(name.into())
    }

    pub fn goal(side: Side) -> Self {
        EntityId::Landmark(format!("g {}", side))
    }

    pub fn player(team: impl Into<String>, number: u8) -> Self {
        EntityId::Player {
            team: team.into(),
            number,
        }
    }

    /// Map a wire id to a registry key
    ///
    /// Only ids that name exactly one object resolve. Partially qualified
    /// players and capitalised close-range classes are ambiguous.
    pub fn resolve(id: &ObjectId) -> Result<(EntityId, EntityKind), RegistryRejection> {
        match id {
            ObjectId::Ball => Ok((EntityId::Ball, EntityKind::Ball)),
            ObjectId::Goal(_) | ObjectId::Flag(_) => {
                Ok((EntityId::Landmark(id.to_string()), EntityKind::Landmark))
            }
            ObjectId::Player {
                team: Some(team),
                number: Some(number),
                goalie,
            } => Ok((
                EntityId::player(team.clone(), *number),
                EntityKind::Player { goalie: *goalie },
            )),
            ObjectId::Player { .. } | ObjectId::Unidentified(_) => {
                Err(RegistryRejection::Ambiguous(id.to_string()))
            }
            ObjectId::Line(_) | ObjectId::Unknown(_) => {
                Err(RegistryRejection::NotTracked(id.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Field position; landmarks hold a forever estimate
    pub position: Option<Estimate<Point2>>,
    /// Bearing relative to our head at the last sighting
    pub direction: Option<Estimate<Angle>>,
    pub distance: Option<Estimate<f64>>,
    pub last_seen: Option<Cycle>,
}

impl Entity {
    pub fn landmark(name: impl Into<String>, position: Point2) -> Self {
        Self {
            id: EntityId::landmark(name),
            kind: EntityKind::Landmark,
            position: Some(Estimate::fixed(position, 1.0)),
            direction: None,
            distance: None,
            last_seen: None,
        }
    }

    pub fn mobile(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            position: None,
            direction: None,
            distance: None,
            last_seen: None,
        }
    }

    pub fn is_landmark(&self) -> bool {
        matches!(self.kind, EntityKind::Landmark)
    }
}
