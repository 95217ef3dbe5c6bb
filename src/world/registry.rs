//! Entity registry - the canonical belief state
//!
//! Landmarks are seeded once from field geometry and never change. Ball and
//! player entities appear on their first unambiguous sighting and are only
//! ever overwritten afterwards; nothing is deleted during a session.
//!
//! A perception batch is folded in three steps: landmark sightings are
//! collected, the agent localizes itself against them, and only then are
//! moving objects placed relative to the fresh pose.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;
use serde::Serialize;

use crate::core::config::AgentConfig;
use crate::core::error::RegistryRejection;
use crate::core::types::{Angle, Cycle, Point2};
use crate::protocol::body::BodyState;
use crate::protocol::message::{InitInfo, ParsedObservation, Perception};
use crate::spatial::triangulation::{multilaterate, project, Fix};
use crate::world::entity::{Entity, EntityId, EntityKind};
use crate::world::estimate::{record, Estimate};
use crate::world::landmarks::standard_landmarks;
use crate::world::snapshot::{EntityView, LandmarkSighting, Reading, SelfView, WorldSnapshot};

/// Registry behind the single lock shared by ingestion and actuation
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Lock the shared registry, recovering the data if a holder panicked
pub fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Landmark seen; its position is fixed so only the sighting is kept
    LandmarkSighted,
}

/// Summary of one perception batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub applied: usize,
    pub created: usize,
    pub rejected: usize,
    /// Whether the agent's own position was fixed from this batch
    pub localized: bool,
}

/// Counters a reader compares between snapshots to detect silence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Every applied timed message, perception or body state
    pub messages: u64,
    /// Applied perceptions only
    pub perceptions: u64,
}

/// What the agent believes about itself
#[derive(Debug, Clone, Default)]
pub struct SelfState {
    pub identity: Option<InitInfo>,
    pub position: Option<Estimate<Point2>>,
    /// Head direction in field coordinates
    pub facing: Option<Estimate<Angle>>,
    pub body: Option<BodyState>,
}

pub struct Registry {
    config: Arc<AgentConfig>,
    entities: AHashMap<EntityId, Entity>,
    me: SelfState,
    latest_time: Option<Cycle>,
    progress: Progress,
    sightings: Vec<LandmarkSighting>,
    sightings_time: Option<Cycle>,
}

impl Registry {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        let entities = standard_landmarks(&config.field)
            .into_iter()
            .map(|(name, position)| {
                let entity = Entity::landmark(name, position);
                (entity.id.clone(), entity)
            })
            .collect();

        Self {
            config,
            entities,
            me: SelfState::default(),
            latest_time: None,
            progress: Progress::default(),
            sightings: Vec::new(),
            sightings_time: None,
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn me(&self) -> &SelfState {
        &self.me
    }

    /// Newest server time folded in so far
    pub fn latest_time(&self) -> Option<Cycle> {
        self.latest_time
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn set_identity(&mut self, identity: InitInfo) {
        self.me.identity = Some(identity);
    }

    pub fn apply_body(&mut self, body: BodyState) {
        self.observe_time(body.time);
        self.me.body = Some(body);
    }

    /// Fold a single observation in
    ///
    /// Landmark sightings only feed the next localization; use
    /// [`Registry::apply_perception`] to localize and place movers in one step.
    pub fn upsert(
        &mut self,
        observation: &ParsedObservation,
        now: Cycle,
    ) -> Result<UpsertOutcome, RegistryRejection> {
        let (id, kind) = EntityId::resolve(&observation.id)?;
        self.observe_perception(now);
        match kind {
            EntityKind::Landmark => self.sight_landmark(id, observation, now),
            _ => Ok(self.update_mover(id, kind, observation, now)),
        }
    }

    /// Apply one parsed perception message as a single batch
    pub fn apply_perception(&mut self, perception: &Perception) -> BatchOutcome {
        let now = perception.time;
        let mut outcome = BatchOutcome::default();
        let mut movers = Vec::new();

        self.observe_perception(now);

        for observation in &perception.observations {
            match EntityId::resolve(&observation.id) {
                Ok((id, EntityKind::Landmark)) => {
                    match self.sight_landmark(id, observation, now) {
                        Ok(_) => outcome.applied += 1,
                        Err(rejection) => {
                            tracing::trace!(%rejection, "observation dropped");
                            outcome.rejected += 1;
                        }
                    }
                }
                Ok((id, kind)) => movers.push((id, kind, observation)),
                Err(rejection) => {
                    tracing::trace!(%rejection, "observation dropped");
                    outcome.rejected += 1;
                }
            }
        }

        outcome.localized = self.localize(now);

        for (id, kind, observation) in movers {
            if self.update_mover(id, kind, observation, now) == UpsertOutcome::Created {
                outcome.created += 1;
            }
            outcome.applied += 1;
        }

        outcome
    }

    /// Confidence decays lazily at read time, so there is nothing to do
    /// eagerly; entities are never pruned.
    pub fn tick(&mut self, _now: Cycle) {}

    /// Copy every entity with confidences evaluated at `now`
    pub fn snapshot(&self, now: Cycle) -> WorldSnapshot {
        let entities = self
            .entities
            .iter()
            .map(|(id, entity)| (id.clone(), EntityView::capture(entity, now)))
            .collect();

        let head_facing = self.me.facing.as_ref().map(|f| Reading::of(f, now));
        let neck = self
            .me
            .body
            .as_ref()
            .and_then(|b| b.head_angle)
            .map(Angle::new);
        let body_facing = head_facing.zip(neck).map(|(head, neck)| Reading {
            value: head.value - neck,
            ..head
        });

        let me = SelfView {
            identity: self.me.identity.clone(),
            position: self.me.position.as_ref().map(|p| Reading::of(p, now)),
            head_facing,
            body_facing,
            body: self.me.body.clone(),
        };

        WorldSnapshot::new(now, me, entities, self.sightings.clone())
    }

    fn observe_time(&mut self, time: Cycle) {
        self.latest_time = Some(self.latest_time.map_or(time, |t| t.max(time)));
        self.progress.messages += 1;
    }

    /// Sightings only ever describe the newest perception
    fn observe_perception(&mut self, now: Cycle) {
        self.observe_time(now);
        self.progress.perceptions += 1;
        if self.sightings_time != Some(now) {
            self.sightings.clear();
            self.sightings_time = Some(now);
        }
    }

    fn sight_landmark(
        &mut self,
        id: EntityId,
        observation: &ParsedObservation,
        now: Cycle,
    ) -> Result<UpsertOutcome, RegistryRejection> {
        let position = self
            .entities
            .get(&id)
            .and_then(|e| e.position.as_ref())
            .map(|p| p.value())
            .ok_or_else(|| RegistryRejection::UnknownLandmark(id.to_string()))?;

        self.sightings.retain(|s| s.id != id);
        self.sightings.push(LandmarkSighting {
            id,
            position,
            distance: observation.distance,
            direction: observation.direction.map(Angle::new),
            time: now,
        });
        Ok(UpsertOutcome::LandmarkSighted)
    }

    fn update_mover(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        observation: &ParsedObservation,
        now: Cycle,
    ) -> UpsertOutcome {
        let decay = &self.config.decay;
        let confidence = decay.observation_confidence;
        let placed = self.place(observation, now);

        let mut outcome = UpsertOutcome::Updated;
        let entity = self.entities.entry(id.clone()).or_insert_with(|| {
            outcome = UpsertOutcome::Created;
            Entity::mobile(id, kind)
        });

        // Goalie status is only reported at close range; keep it once seen
        if let (EntityKind::Player { goalie }, EntityKind::Player { goalie: true }) =
            (&mut entity.kind, kind)
        {
            *goalie = true;
        }

        if let Some(direction) = observation.direction {
            record(
                &mut entity.direction,
                Angle::new(direction),
                confidence,
                now,
                decay.direction_k,
            );
        }
        if let Some(distance) = observation.distance {
            record(&mut entity.distance, distance, confidence, now, decay.distance_k);
        }
        if let Some((position, pose_confidence)) = placed {
            record(
                &mut entity.position,
                position,
                confidence.min(pose_confidence),
                now,
                decay.position_k,
            );
        }
        entity.last_seen = Some(now);
        outcome
    }

    /// Field position of a relative sighting, if our own pose is known
    fn place(&self, observation: &ParsedObservation, now: Cycle) -> Option<(Point2, f64)> {
        let distance = observation.distance?;
        let direction = Angle::new(observation.direction?);
        let (origin, origin_confidence) = self.me.position.as_ref()?.read(now);
        let (facing, facing_confidence) = self.me.facing.as_ref()?.read(now);
        Some((
            project(origin, facing, distance, direction),
            origin_confidence.min(facing_confidence),
        ))
    }

    /// Update our own position and head facing from this cycle's landmarks
    fn localize(&mut self, now: Cycle) -> bool {
        if self.sightings_time != Some(now) {
            return false;
        }
        let decay = &self.config.decay;
        let confidence = decay.observation_confidence;

        let ranges: Vec<(Point2, f64)> = self
            .sightings
            .iter()
            .filter_map(|s| s.distance.map(|d| (s.position, d)))
            .collect();
        let prior = self.me.position.as_ref().map(|p| p.value());
        let fix = match multilaterate(&ranges) {
            Fix::Ambiguous(p, q) if prior.is_none() => self.inside_field(p, q),
            fix => fix.nearest_to(prior).filter(|&p| self.on_pitch(p)),
        };
        if fix.is_none() && ranges.len() >= 2 {
            tracing::debug!(landmarks = ranges.len(), time = now, "no position fix");
        }

        if let Some(position) = fix {
            record(&mut self.me.position, position, confidence, now, decay.position_k);
        }

        // Facing needs a position; fall back to the last one if no fix
        let Some(origin) = self.me.position.as_ref().map(|p| p.value()) else {
            return fix.is_some();
        };
        let headings = self.sightings.iter().filter_map(|s| {
            let direction = s.direction?;
            if s.position.distance(origin) < 1e-6 {
                return None;
            }
            Some(Angle::bearing(origin, s.position) - direction)
        });
        if let Some(facing) = Angle::circular_mean(headings) {
            record(&mut self.me.facing, facing, confidence, now, decay.direction_k);
        }

        fix.is_some()
    }

    /// Within the pitch plus the flag boundary
    fn on_pitch(&self, c: Point2) -> bool {
        let field = &self.config.field;
        c.x.abs() <= field.length / 2.0 + field.boundary_offset
            && c.y.abs() <= field.width / 2.0 + field.boundary_offset
    }

    /// Without a prior, keep the mirror candidate that lies on the pitch
    fn inside_field(&self, p: Point2, q: Point2) -> Option<Point2> {
        match (self.on_pitch(p), self.on_pitch(q)) {
            (true, false) => Some(p),
            (false, true) => Some(q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Side;
    use crate::protocol::message::{parse_message, ServerMessage};
    use crate::protocol::object_id::ObjectId;

    fn registry() -> Registry {
        Registry::new(Arc::new(AgentConfig::default()))
    }

    fn perception(raw: &str) -> Perception {
        match parse_message(raw).unwrap() {
            ServerMessage::See(p) => p,
            other => panic!("not a perception: {:?}", other),
        }
    }

    fn observation(id: ObjectId, time: Cycle, distance: f64, direction: f64) -> ParsedObservation {
        ParsedObservation {
            distance: Some(distance),
            direction: Some(direction),
            ..ParsedObservation::new(id, time)
        }
    }

    /// Sighting of landmark `name` from `me` with head facing `facing`
    fn sight(name: &str, at: Point2, me: Point2, facing: f64) -> String {
        let distance = me.distance(at);
        let direction = (Angle::bearing(me, at) - Angle::new(facing)).degrees();
        format!("(({}) {:.6} {:.6})", name, distance, direction)
    }

    #[test]
    fn test_new_seeds_landmarks() {
        let r = registry();
        assert_eq!(r.len(), 55);
        let goal = r.get(&EntityId::landmark("g l")).unwrap();
        assert_eq!(goal.position.unwrap().value(), Point2::new(-52.5, 0.0));
        assert!(r.get(&EntityId::Ball).is_none());
    }

    #[test]
    fn test_ball_confidence_half_after_five_cycles() {
        let mut r = registry();
        let obs = observation(ObjectId::Ball, 10, 1.0, 20.0);
        assert_eq!(r.upsert(&obs, 10), Ok(UpsertOutcome::Created));
        let snapshot = r.snapshot(15);
        let direction = snapshot.ball().unwrap().direction.unwrap();
        assert!((direction.confidence - 0.5).abs() < 1e-12);
        assert_eq!(direction.value, Angle::new(20.0));
    }

    #[test]
    fn test_second_sighting_updates() {
        let mut r = registry();
        r.upsert(&observation(ObjectId::Ball, 1, 3.0, 0.0), 1).unwrap();
        let outcome = r.upsert(&observation(ObjectId::Ball, 2, 2.0, 5.0), 2);
        assert_eq!(outcome, Ok(UpsertOutcome::Updated));
        let ball = r.get(&EntityId::Ball).unwrap();
        assert_eq!(ball.distance.unwrap().value(), 2.0);
        assert_eq!(ball.last_seen, Some(2));
    }

    #[test]
    fn test_ambiguous_player_rejected() {
        let mut r = registry();
        let partial = ObjectId::Player {
            team: Some("Other".into()),
            number: None,
            goalie: false,
        };
        let before = r.len();
        let result = r.upsert(&observation(partial, 3, 10.0, 0.0), 3);
        assert!(matches!(result, Err(RegistryRejection::Ambiguous(_))));
        assert_eq!(r.len(), before);
    }

    #[test]
    fn test_landmarks_are_immutable() {
        let mut r = registry();
        let obs = observation(ObjectId::Goal(Side::Right), 4, 30.0, 10.0);
        assert_eq!(r.upsert(&obs, 4), Ok(UpsertOutcome::LandmarkSighted));
        let goal = r.get(&EntityId::landmark("g r")).unwrap();
        assert_eq!(goal.position.unwrap().value(), Point2::new(52.5, 0.0));
        assert!(goal.direction.is_none());
        assert_eq!(r.snapshot(4).visible_landmarks().len(), 1);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let mut r = registry();
        let obs = observation(ObjectId::Flag("x y z".into()), 1, 5.0, 0.0);
        assert!(matches!(
            r.upsert(&obs, 1),
            Err(RegistryRejection::UnknownLandmark(_))
        ));
    }

    #[test]
    fn test_localize_and_place_ball() {
        let mut r = registry();
        let me = Point2::new(-10.0, 5.0);
        let facing = 30.0;
        let ball = Point2::new(0.0, 0.0);
        let raw = format!(
            "(see 7 {} {} {} {})",
            sight("g r", Point2::new(52.5, 0.0), me, facing),
            sight("f c t", Point2::new(0.0, -34.0), me, facing),
            sight("f p l c", Point2::new(-36.0, 0.0), me, facing),
            sight("b", ball, me, facing),
        );
        let outcome = r.apply_perception(&perception(&raw));
        assert!(outcome.localized);
        assert_eq!(outcome.applied, 4);
        assert_eq!(outcome.created, 1);

        let snapshot = r.snapshot(7);
        let position = snapshot.me().position.unwrap();
        assert!(position.value.distance(me) < 1e-3);
        let head = snapshot.me().head_facing.unwrap().value;
        assert!(head.delta(Angle::new(facing)).degrees().abs() < 1e-3);

        let placed = snapshot.ball().unwrap().position.unwrap();
        assert!(placed.value.distance(ball) < 1e-3);
        assert_eq!(placed.confidence, 1.0);
    }

    #[test]
    fn test_two_landmarks_use_prior() {
        let mut r = registry();
        let me = Point2::new(20.0, 10.0);
        let first = format!(
            "(see 1 {} {} {})",
            sight("g r", Point2::new(52.5, 0.0), me, 0.0),
            sight("f c", Point2::ZERO, me, 0.0),
            sight("f c b", Point2::new(0.0, 34.0), me, 0.0),
        );
        assert!(r.apply_perception(&perception(&first)).localized);

        let moved = Point2::new(21.0, 10.0);
        let second = format!(
            "(see 2 {} {})",
            sight("f c", Point2::ZERO, moved, 0.0),
            sight("f c b", Point2::new(0.0, 34.0), moved, 0.0),
        );
        assert!(r.apply_perception(&perception(&second)).localized);
        let position = r.me().position.unwrap().value();
        assert!(position.distance(moved) < 1e-3);
    }

    #[test]
    fn test_two_landmarks_without_prior_prefer_pitch() {
        let mut r = registry();
        // Mirror image of (40, 0) across the goal line lies off the pitch
        let me = Point2::new(40.0, 0.0);
        let raw = format!(
            "(see 1 {} {})",
            sight("g r", Point2::new(52.5, 0.0), me, 0.0),
            sight("f r t", Point2::new(52.5, -34.0), me, 0.0),
        );
        assert!(r.apply_perception(&perception(&raw)).localized);
        assert!(r.me().position.unwrap().value().distance(me) < 1e-3);
    }

    /// Touchline view: every visible flag sits on y = -39
    fn touchline_view(time: Cycle, me: Point2, facing: f64, names: &[&str]) -> String {
        let flags: String = names
            .iter()
            .map(|name| {
                let x = match *name {
                    "f t r 10" => 10.0,
                    "f t 0" => 0.0,
                    "f t l 10" => -10.0,
                    other => panic!("no position for {}", other),
                };
                sight(name, Point2::new(x, -39.0), me, facing)
            })
            .collect();
        format!("(see {} {})", time, flags)
    }

    #[test]
    fn test_collinear_flags_localize_on_pitch_in_any_order() {
        let me = Point2::new(0.0, -20.0);
        for names in [
            ["f t r 10", "f t 0", "f t l 10"],
            ["f t l 10", "f t 0", "f t r 10"],
            ["f t 0", "f t l 10", "f t r 10"],
        ] {
            let mut r = registry();
            let outcome = r.apply_perception(&perception(&touchline_view(1, me, -90.0, &names)));
            assert!(outcome.localized);
            let position = r.me().position.unwrap().value();
            assert!(position.distance(me) < 1e-3, "{:?} localized at {:?}", names, position);
            let facing = r.me().facing.unwrap().value();
            assert!(facing.delta(Angle::new(-90.0)).degrees().abs() < 1e-3);
        }
    }

    #[test]
    fn test_collinear_flags_follow_prior() {
        let mut r = registry();
        r.me.position = Some(Estimate::new(Point2::new(1.0, -21.0), 1.0, 0, 5.0));
        let me = Point2::new(0.0, -20.0);
        let raw = touchline_view(1, me, -90.0, &["f t r 10", "f t 0", "f t l 10"]);
        assert!(r.apply_perception(&perception(&raw)).localized);
        assert!(r.me().position.unwrap().value().distance(me) < 1e-3);
    }

    #[test]
    fn test_off_pitch_fix_discarded() {
        let mut r = registry();
        r.me.position = Some(Estimate::new(Point2::new(0.0, -60.0), 1.0, 0, 5.0));
        // Prior sits on the mirror side; the nearer candidate is off the pitch
        let me = Point2::new(0.0, -20.0);
        let raw = touchline_view(1, me, -90.0, &["f t r 10", "f t 0", "f t l 10"]);
        assert!(!r.apply_perception(&perception(&raw)).localized);
        assert_eq!(r.me().position.unwrap().value(), Point2::new(0.0, -60.0));
    }

    #[test]
    fn test_sightings_cleared_by_perception_without_landmarks() {
        let mut r = registry();
        r.apply_perception(&perception("(see 1 ((g r) 30 10))"));
        assert!(r.snapshot(1).sighting(&EntityId::landmark("g r")).is_some());

        r.apply_perception(&perception("(see 50 ((b) 2 5))"));
        let snapshot = r.snapshot(50);
        assert!(snapshot.sighting(&EntityId::landmark("g r")).is_none());
        assert!(snapshot.visible_landmarks().is_empty());
    }

    #[test]
    fn test_body_state_does_not_count_as_perception() {
        let mut r = registry();
        r.apply_perception(&perception("(see 1 ((b) 2 5))"));
        let before = r.progress();
        r.apply_body(BodyState {
            time: 2,
            ..BodyState::default()
        });
        let after = r.progress();
        assert_eq!(after.messages, before.messages + 1);
        assert_eq!(after.perceptions, before.perceptions);
    }

    #[test]
    fn test_rejections_counted_in_batch() {
        let mut r = registry();
        let p = perception("(see 3 ((p \"Other\") 10 0) ((l r) 5 90) ((b) 2 0))");
        let outcome = r.apply_perception(&p);
        assert_eq!(outcome.rejected, 2);
        assert_eq!(outcome.applied, 1);
        assert!(!outcome.localized);
        assert_eq!(r.latest_time(), Some(3));
    }

    #[test]
    fn test_body_facing_subtracts_head_angle() {
        let mut r = registry();
        r.me.facing = Some(Estimate::new(Angle::new(40.0), 1.0, 5, 5.0));
        r.apply_body(BodyState {
            time: 5,
            head_angle: Some(30.0),
            ..BodyState::default()
        });
        let snapshot = r.snapshot(5);
        let body = snapshot.me().body_facing.unwrap();
        assert!((body.value.degrees() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_goalie_flag_sticks() {
        let mut r = registry();
        let goalie = ObjectId::Player {
            team: Some("Other".into()),
            number: Some(1),
            goalie: true,
        };
        let plain = ObjectId::Player {
            team: Some("Other".into()),
            number: Some(1),
            goalie: false,
        };
        r.upsert(&observation(goalie, 1, 5.0, 0.0), 1).unwrap();
        r.upsert(&observation(plain, 2, 40.0, 0.0), 2).unwrap();
        let player = r.get(&EntityId::player("Other", 1)).unwrap();
        assert_eq!(player.kind, EntityKind::Player { goalie: true });
    }

    #[test]
    fn test_snapshot_detached_from_registry() {
        let mut r = registry();
        r.upsert(&observation(ObjectId::Ball, 1, 3.0, 0.0), 1).unwrap();
        let snapshot = r.snapshot(1);
        r.upsert(&observation(ObjectId::Ball, 2, 9.0, 45.0), 2).unwrap();
        assert_eq!(snapshot.ball().unwrap().distance.unwrap().value, 3.0);
    }

    #[test]
    fn test_tick_never_prunes() {
        let mut r = registry();
        r.upsert(&observation(ObjectId::Ball, 1, 3.0, 0.0), 1).unwrap();
        r.tick(1_000_000);
        assert_eq!(r.len(), 56);
        let faded = r.snapshot(1_000_000).ball().unwrap().distance.unwrap().confidence;
        assert!(faded > 0.0);
    }

    #[test]
    fn test_poisoned_lock_recovers() {
        let shared = registry().into_shared();
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(lock_registry(&shared).len(), 55);
    }
}
