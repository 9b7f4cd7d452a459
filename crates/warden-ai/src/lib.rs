//! # Warden AI
//!
//! Engine-independent combat AI building blocks.
//!
//! This crate provides the per-entity state an AI controller needs to pick
//! and pursue targets:
//! - Threat tables with decay, hysteresis-based switching, and taunts
//! - Perception trackers with vision cones, hearing, and an alert state machine
//! - A world query seam ([`WorldQuery`]) plus a mock for tests
//! - Event bus for forwarding AI notifications
//! - TOML configuration
//!
//! Everything is tick-driven: callers pass `now` and `dt` explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod events;
pub mod perception;
pub mod threat;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::perception::*;
    pub use crate::threat::*;
    pub use crate::world::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use warden_common::EntityId;

    const GUARD: EntityId = EntityId::from_raw(1);
    const THIEF: EntityId = EntityId::from_raw(2);
    const DECOY: EntityId = EntityId::from_raw(3);

    #[test]
    fn test_detection_feeds_threat() {
        let mut world = MockWorld::new();
        world.place(GUARD, Vec3::ZERO);
        world.place(THIEF, Vec3::new(0.0, 0.0, 6.0));

        let config = AiConfig::default();
        let mut perception = PerceptionTracker::new(GUARD, config.perception.clone());
        let mut threat = ThreatTable::new(GUARD, config.threat.clone());

        let dt = 0.05;
        let mut detected = None;
        for step in 1..=100 {
            let now = f64::from(step) * f64::from(dt);
            perception.update(&world, now, dt);
            for event in perception.drain_events() {
                if let PerceptionEvent::TargetDetected { target, .. } = event {
                    threat.add_aggro(&world, target, 25.0, now);
                    detected = Some(now);
                }
            }
            threat.update(&world, now, dt);
        }

        assert!(detected.is_some());
        assert_eq!(threat.current_target(), Some(THIEF));
        assert_eq!(perception.state(), AlertState::Alert);
    }

    #[test]
    fn test_bus_collects_both_components() {
        let mut world = MockWorld::new();
        world.place(GUARD, Vec3::ZERO);
        world.place(THIEF, Vec3::new(0.0, 0.0, 6.0));
        world.place(DECOY, Vec3::new(4.0, 0.0, 0.0));

        let bus = EventBus::default();
        let mut perception = PerceptionTracker::new(GUARD, PerceptionConfig::default());
        let mut threat = ThreatTable::new(GUARD, ThreatConfig::default());
        perception.attach_bus(&bus);
        threat.attach_bus(&bus);

        perception.hear_sound(&world, Vec3::new(4.0, 0.0, 0.0), 1.0, Some(DECOY), 0.0);
        threat.taunt(&world, DECOY, 2.0, 0.0);

        let events = bus.drain();
        assert!(events
            .iter()
            .any(|e| matches!(e, AiEvent::Perception { event: PerceptionEvent::SoundHeard { .. }, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            AiEvent::Threat {
                event: ThreatEvent::TargetChanged { new: Some(DECOY), .. },
                ..
            }
        )));
        assert!(events.iter().all(|e| e.owner() == GUARD));
    }
}
