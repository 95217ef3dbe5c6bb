//! Immutable point-in-time views handed to the decision policy

use ahash::AHashMap;

use crate::core::types::{Angle, Cycle, Point2, Side};
use crate::protocol::body::BodyState;
use crate::protocol::message::InitInfo;
use crate::world::entity::{Entity, EntityId, EntityKind};
use crate::world::estimate::{Estimate, EstimateValue};

/// An estimate evaluated at the snapshot time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading<V> {
    pub value: V,
    pub confidence: f64,
    /// Cycles since the value was written
    pub age: u32,
}

impl<V: EstimateValue> Reading<V> {
    pub fn of(estimate: &Estimate<V>, now: Cycle) -> Self {
        let (value, confidence) = estimate.read(now);
        Self {
            value,
            confidence,
            age: estimate.age(now),
        }
    }
}

fn read<V: EstimateValue>(slot: &Option<Estimate<V>>, now: Cycle) -> Option<Reading<V>> {
    slot.as_ref().map(|e| Reading::of(e, now))
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Option<Reading<Point2>>,
    pub direction: Option<Reading<Angle>>,
    pub distance: Option<Reading<f64>>,
    pub last_seen: Option<Cycle>,
}

impl EntityView {
    pub fn capture(entity: &Entity, now: Cycle) -> Self {
        Self {
            id: entity.id.clone(),
            kind: entity.kind,
            position: read(&entity.position, now),
            direction: read(&entity.direction, now),
            distance: read(&entity.distance, now),
            last_seen: entity.last_seen,
        }
    }
}

/// A landmark seen in the most recent perception
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSighting {
    pub id: EntityId,
    pub position: Point2,
    pub distance: Option<f64>,
    pub direction: Option<Angle>,
    pub time: Cycle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfView {
    pub identity: Option<InitInfo>,
    pub position: Option<Reading<Point2>>,
    pub head_facing: Option<Reading<Angle>>,
    /// Head facing corrected by the last reported neck angle
    pub body_facing: Option<Reading<Angle>>,
    pub body: Option<BodyState>,
}

impl SelfView {
    pub fn side(&self) -> Option<Side> {
        self.identity.as_ref().map(|i| i.side)
    }
}

/// Self-consistent copy of the registry at one instant
///
/// Confidences were evaluated at `time` during capture; the snapshot holds
/// no reference back into the live registry.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    time: Cycle,
    stale: bool,
    me: SelfView,
    entities: AHashMap<EntityId, EntityView>,
    visible_landmarks: Vec<LandmarkSighting>,
}

impl WorldSnapshot {
    pub(crate) fn new(
        time: Cycle,
        me: SelfView,
        entities: AHashMap<EntityId, EntityView>,
        visible_landmarks: Vec<LandmarkSighting>,
    ) -> Self {
        Self {
            time,
            stale: false,
            me,
            entities,
            visible_landmarks,
        }
    }

    /// Flag a snapshot taken after too many cycles without perception
    pub(crate) fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    pub fn time(&self) -> Cycle {
        self.time
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn me(&self) -> &SelfView {
        &self.me
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityView> {
        self.entities.get(id)
    }

    pub fn ball(&self) -> Option<&EntityView> {
        self.entities.get(&EntityId::Ball)
    }

    pub fn players(&self) -> impl Iterator<Item = &EntityView> {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Player { .. }))
    }

    pub fn landmarks(&self) -> impl Iterator<Item = &EntityView> {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Landmark))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityView> {
        self.entities.values()
    }

    pub fn visible_landmarks(&self) -> &[LandmarkSighting] {
        &self.visible_landmarks
    }

    /// Sighting of a landmark from the latest perception
    pub fn sighting(&self, id: &EntityId) -> Option<&LandmarkSighting> {
        self.visible_landmarks.iter().find(|s| &s.id == id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
