//! Belief state: estimates, entities and the registry that owns them

pub mod entity;
pub mod estimate;
pub mod landmarks;
pub mod registry;
pub mod snapshot;

pub use entity::{Entity, EntityId, EntityKind};
pub use estimate::{Estimate, EstimateValue};
pub use landmarks::standard_landmarks;
pub use registry::{
    lock_registry, BatchOutcome, Progress, Registry, SelfState, SharedRegistry, UpsertOutcome,
};
pub use snapshot::{EntityView, LandmarkSighting, Reading, SelfView, WorldSnapshot};
