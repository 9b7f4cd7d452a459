//! World query seam used by the AI components.
//!
//! The AI core never touches physics or scene data directly. Everything it
//! needs about other entities goes through [`WorldQuery`].

use ahash::{AHashMap, AHashSet};
use glam::Vec3;
use warden_common::EntityId;

/// Spatial and lifetime queries the AI components depend on.
pub trait WorldQuery {
    /// Gets an entity's base position (feet), or `None` if unknown.
    fn position(&self, entity: EntityId) -> Option<Vec3>;
    /// Gets an entity's facing direction, or `None` if unknown.
    fn forward(&self, entity: EntityId) -> Option<Vec3>;
    /// Checks that nothing occludes the segment between two points.
    fn line_of_sight_clear(&self, from: Vec3, to: Vec3) -> bool;
    /// Returns candidate entities within `radius` of `center`.
    fn entities_within_radius(&self, center: Vec3, radius: f32) -> Vec<EntityId>;

    /// Euclidean distance between two world positions.
    fn distance(&self, a: Vec3, b: Vec3) -> f32 {
        a.distance(b)
    }

    /// Checks if an entity still exists.
    fn is_alive(&self, entity: EntityId) -> bool {
        self.position(entity).is_some()
    }

    /// Distance between two entities, if both positions are known.
    fn distance_between(&self, a: EntityId, b: EntityId) -> Option<f32> {
        Some(self.distance(self.position(a)?, self.position(b)?))
    }
}

/// Mock world for testing.
///
/// Line of sight is clear unless a blocker was registered for the exact
/// (observer, target) pair or LOS was disabled globally.
#[derive(Debug, Default)]
pub struct MockWorld {
    positions: AHashMap<EntityId, Vec3>,
    forwards: AHashMap<EntityId, Vec3>,
    blocked: AHashSet<(EntityId, EntityId)>,
    los_disabled: bool,
}

impl MockWorld {
    /// Creates an empty mock world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an entity facing +Z.
    pub fn place(&mut self, entity: EntityId, position: Vec3) {
        self.positions.insert(entity, position);
        self.forwards.entry(entity).or_insert(Vec3::Z);
    }

    /// Moves an existing entity (or places it).
    pub fn move_to(&mut self, entity: EntityId, position: Vec3) {
        self.place(entity, position);
    }

    /// Sets an entity's facing direction.
    pub fn face(&mut self, entity: EntityId, forward: Vec3) {
        self.forwards.insert(entity, forward);
    }

    /// Removes an entity from the world.
    pub fn despawn(&mut self, entity: EntityId) {
        self.positions.remove(&entity);
        self.forwards.remove(&entity);
    }

    /// Blocks line of sight from `observer` to `target`.
    pub fn block_sight(&mut self, observer: EntityId, target: EntityId) {
        self.blocked.insert((observer, target));
    }

    /// Clears a sight blocker.
    pub fn unblock_sight(&mut self, observer: EntityId, target: EntityId) {
        self.blocked.remove(&(observer, target));
    }

    /// Sets whether LOS is always blocked.
    pub fn set_los_disabled(&mut self, disabled: bool) {
        self.los_disabled = disabled;
    }

    fn entity_near(&self, point: Vec3) -> Option<EntityId> {
        // LOS endpoints are offset vertically from entity bases
        self.positions
            .iter()
            .filter(|(_, pos)| (pos.x - point.x).abs() < 1e-3 && (pos.z - point.z).abs() < 1e-3)
            .map(|(id, _)| *id)
            .min()
    }
}

impl WorldQuery for MockWorld {
    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.positions.get(&entity).copied()
    }

    fn forward(&self, entity: EntityId) -> Option<Vec3> {
        self.forwards.get(&entity).copied()
    }

    fn line_of_sight_clear(&self, from: Vec3, to: Vec3) -> bool {
        if self.los_disabled {
            return false;
        }
        match (self.entity_near(from), self.entity_near(to)) {
            (Some(observer), Some(target)) => !self.blocked.contains(&(observer, target)),
            _ => true,
        }
    }

    fn entities_within_radius(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self
            .positions
            .iter()
            .filter(|(_, pos)| pos.distance(center) <= radius)
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }
}
