//! Minimal 3D arena implementing the AI world queries.
//!
//! Bodies are points with a facing direction. Sight is blocked only by
//! sphere occluders, which is enough to stage ambushes behind pillars.

use ahash::AHashMap;
use glam::Vec3;
use tracing::debug;

use warden_ai::WorldQuery;
use warden_common::EntityId;

/// A point body in the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Base position
    pub position: Vec3,
    /// Facing direction
    pub forward: Vec3,
}

/// Spherical sight blocker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl Occluder {
    /// Checks if the segment `from -> to` passes through the sphere.
    #[must_use]
    pub fn blocks(&self, from: Vec3, to: Vec3) -> bool {
        let segment = to - from;
        let len_sq = segment.length_squared();
        let t = if len_sq <= f32::EPSILON {
            0.0
        } else {
            ((self.center - from).dot(segment) / len_sq).clamp(0.0, 1.0)
        };
        (from + segment * t).distance_squared(self.center) < self.radius * self.radius
    }
}

/// Arena holding bodies and occluders.
#[derive(Debug, Default)]
pub struct Arena {
    bodies: AHashMap<EntityId, Body>,
    occluders: Vec<Occluder>,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a body facing +Z and returns its ID.
    pub fn spawn(&mut self, position: Vec3) -> EntityId {
        let id = EntityId::next();
        self.bodies.insert(
            id,
            Body {
                position,
                forward: Vec3::Z,
            },
        );
        debug!("Spawned {id} at {position}");
        id
    }

    /// Removes a body.
    pub fn despawn(&mut self, id: EntityId) -> Option<Body> {
        self.bodies.remove(&id)
    }

    /// Adds a sphere occluder.
    pub fn add_occluder(&mut self, center: Vec3, radius: f32) {
        self.occluders.push(Occluder {
            center,
            radius: radius.max(0.0),
        });
    }

    /// Gets a body.
    #[must_use]
    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Moves a body, turning it towards the direction of travel.
    pub fn move_to(&mut self, id: EntityId, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(&id) {
            let heading = (position - body.position).normalize_or_zero();
            if heading != Vec3::ZERO {
                body.forward = heading;
            }
            body.position = position;
        }
    }

    /// Turns a body to face `point`, ignoring height.
    pub fn face_towards(&mut self, id: EntityId, point: Vec3) {
        if let Some(body) = self.bodies.get_mut(&id) {
            let flat = Vec3::new(point.x - body.position.x, 0.0, point.z - body.position.z);
            let heading = flat.normalize_or_zero();
            if heading != Vec3::ZERO {
                body.forward = heading;
            }
        }
    }
}

impl WorldQuery for Arena {
    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.bodies.get(&entity).map(|b| b.position)
    }

    fn forward(&self, entity: EntityId) -> Option<Vec3> {
        self.bodies.get(&entity).map(|b| b.forward)
    }

    fn line_of_sight_clear(&self, from: Vec3, to: Vec3) -> bool {
        !self.occluders.iter().any(|o| o.blocks(from, to))
    }

    fn entities_within_radius(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        let radius_sq = radius * radius;
        let mut found: Vec<EntityId> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.position.distance_squared(center) <= radius_sq)
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }
}
