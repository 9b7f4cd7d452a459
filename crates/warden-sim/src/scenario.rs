//! Scripted guard-versus-intruders encounter.
//!
//! A guard combines a perception tracker with a threat table: detections
//! feed threat, and the guard turns to face its current target. Intruders
//! walk waypoint paths and make footstep noise. Timed script actions
//! (damage, heals, taunts, deaths) write into the guard's threat table
//! through its shared handle, the same way other entities would.

use ahash::AHashMap;
use glam::Vec3;
use serde::Serialize;
use tracing::{debug, info};

use warden_ai::{
    AiConfig, AiEvent, AlertState, EventBus, PerceptionEvent, PerceptionTracker,
    SharedThreatTable, ThreatEvent, ThreatTable, WorldQuery,
};
use warden_common::EntityId;

use crate::arena::Arena;
use crate::clock::SimClock;

/// Threat added when the guard first becomes suspicious of someone.
const SUSPICION_THREAT: f32 = 5.0;

/// Threat added when the guard fully detects someone.
const DETECTION_THREAT: f32 = 20.0;

/// AI-controlled guard.
#[derive(Debug)]
pub struct Guard {
    /// Arena body
    pub id: EntityId,
    /// Vision and hearing state
    pub perception: PerceptionTracker,
    /// Threat table, shared with attackers
    pub threat: SharedThreatTable,
}

impl Guard {
    /// Creates a guard for body `id`, publishing on `bus`.
    #[must_use]
    pub fn new(id: EntityId, config: &AiConfig, bus: &EventBus) -> Self {
        let mut perception = PerceptionTracker::new(id, config.perception.clone());
        let mut threat = ThreatTable::new(id, config.threat.clone());
        perception.attach_bus(bus);
        threat.attach_bus(bus);
        Self {
            id,
            perception,
            threat: threat.into_shared(),
        }
    }

    /// Runs one AI tick.
    pub fn tick(&mut self, arena: &mut Arena, now: f64, dt: f32) {
        {
            let arena = &*arena;
            self.perception.update(arena, now, dt);
            let mut threat = self.threat.lock();
            for event in self.perception.drain_events() {
                match event {
                    PerceptionEvent::SuspicionRaised { target } => {
                        threat.add_aggro(arena, target, SUSPICION_THREAT, now);
                    },
                    PerceptionEvent::TargetDetected { target, .. } => {
                        threat.add_aggro(arena, target, DETECTION_THREAT, now);
                    },
                    _ => {},
                }
            }
            threat.update(arena, now, dt);
            threat.drain_events();
        }

        if let Some(point) = self.focus_point(arena) {
            arena.face_towards(self.id, point);
        }
    }

    fn focus_point(&self, arena: &Arena) -> Option<Vec3> {
        let target = self.threat.lock().current_target();
        target
            .and_then(|id| arena.position(id))
            .or_else(|| match self.perception.state() {
                AlertState::Suspicious | AlertState::Searching => {
                    self.perception.last_known_position()
                },
                AlertState::Idle | AlertState::Alert => None,
            })
    }
}

/// Intruder walking a waypoint path.
#[derive(Debug, Clone)]
pub struct Intruder {
    /// Arena body
    pub id: EntityId,
    /// Display name
    pub name: String,
    waypoints: Vec<Vec3>,
    next_waypoint: usize,
    speed: f32,
    footstep_volume: f32,
    footstep_interval: f32,
    footstep_timer: f32,
}

impl Intruder {
    /// Moves along the path. Returns a footstep position when one is due.
    pub fn step(&mut self, arena: &mut Arena, dt: f32) -> Option<Vec3> {
        let position = arena.position(self.id)?;

        if let Some(&goal) = self.waypoints.get(self.next_waypoint) {
            let to_goal = goal - position;
            let travel = self.speed * dt;
            if to_goal.length() <= travel {
                arena.move_to(self.id, goal);
                self.next_waypoint += 1;
            } else {
                arena.move_to(self.id, position + to_goal.normalize_or_zero() * travel);
            }
        } else {
            return None;
        }

        self.footstep_timer -= dt;
        if self.footstep_timer <= 0.0 {
            self.footstep_timer += self.footstep_interval;
            return arena.position(self.id);
        }
        None
    }

    /// Footstep loudness at the source.
    #[must_use]
    pub fn footstep_volume(&self) -> f32 {
        self.footstep_volume
    }

    /// Checks if the intruder reached its last waypoint.
    #[must_use]
    pub fn arrived(&self) -> bool {
        self.next_waypoint >= self.waypoints.len()
    }
}

/// Scripted event applied to the guard's threat table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptAction {
    /// `source` hits the guard
    Damage {
        /// Attacker
        source: EntityId,
        /// Damage dealt
        amount: f32,
    },
    /// `source` heals someone the guard is fighting
    Heal {
        /// Healer
        source: EntityId,
        /// Healing done
        amount: f32,
    },
    /// `source` taunts the guard
    Taunt {
        /// Taunter
        source: EntityId,
        /// Taunt length in seconds
        duration: f32,
    },
    /// `entity` dies and leaves the arena
    Despawn {
        /// Dying entity
        entity: EntityId,
    },
}

/// Action scheduled at a simulated time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledAction {
    /// Time at which the action fires
    pub at: f64,
    /// What happens
    pub action: ScriptAction,
}

/// Threat held against one entity at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatSnapshot {
    /// Entity
    pub entity: EntityId,
    /// Display name
    pub name: String,
    /// Threat value
    pub threat: f32,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    /// Ticks simulated
    pub ticks: u64,
    /// Simulated seconds
    pub elapsed: f64,
    /// Events seen on the bus
    pub events: usize,
    /// Detections by the guard
    pub detections: usize,
    /// Threat target switches
    pub target_changes: usize,
    /// Sounds the guard registered
    pub sounds_heard: usize,
    /// Searches that timed out
    pub searches_ended: usize,
    /// Guard alert state at the end
    pub final_state: AlertState,
    /// Guard target at the end
    pub final_target: Option<String>,
    /// Threat table at the end, highest first
    pub threat: Vec<ThreatSnapshot>,
}

#[derive(Debug, Default)]
struct EventTally {
    events: usize,
    detections: usize,
    target_changes: usize,
    sounds_heard: usize,
    searches_ended: usize,
}

/// A complete encounter.
#[derive(Debug)]
pub struct Scenario {
    arena: Arena,
    clock: SimClock,
    bus: EventBus,
    guard: Guard,
    intruders: Vec<Intruder>,
    script: Vec<ScheduledAction>,
    names: AHashMap<EntityId, String>,
    tally: EventTally,
}

impl Scenario {
    /// Builds the courtyard encounter.
    ///
    /// A prowler sneaks across the guard's front past a pillar, a brute
    /// walks up from behind and attacks, a medic heals from the side, and
    /// the prowler eventually taunts the guard.
    #[must_use]
    pub fn courtyard(config: &AiConfig, tick_rate: u32) -> Self {
        let mut arena = Arena::new();
        arena.add_occluder(Vec3::new(0.0, 1.0, 8.0), 1.5);

        let bus = EventBus::default();
        let guard_id = arena.spawn(Vec3::ZERO);
        let guard = Guard::new(guard_id, config, &bus);

        let mut names = AHashMap::new();
        names.insert(guard_id, "guard".to_string());

        let mut intruders = Vec::new();
        let mut add_intruder = |name: &str,
                                start: Vec3,
                                waypoints: Vec<Vec3>,
                                speed: f32,
                                footstep_volume: f32,
                                footstep_interval: f32| {
            let id = arena.spawn(start);
            names.insert(id, name.to_string());
            intruders.push(Intruder {
                id,
                name: name.to_string(),
                waypoints,
                next_waypoint: 0,
                speed,
                footstep_volume,
                footstep_interval,
                footstep_timer: footstep_interval,
            });
            id
        };

        let prowler = add_intruder(
            "prowler",
            Vec3::new(-15.0, 0.0, 12.0),
            vec![Vec3::new(15.0, 0.0, 12.0), Vec3::new(4.0, 0.0, 6.0)],
            1.5,
            0.3,
            0.8,
        );
        let brute = add_intruder(
            "brute",
            Vec3::new(0.0, 0.0, -14.0),
            vec![Vec3::new(0.0, 0.0, -2.0)],
            2.0,
            1.0,
            0.5,
        );
        let medic = add_intruder(
            "medic",
            Vec3::new(8.0, 0.0, -8.0),
            vec![Vec3::new(6.0, 0.0, -6.0)],
            1.0,
            0.2,
            1.0,
        );

        let script = vec![
            ScheduledAction {
                at: 7.0,
                action: ScriptAction::Damage {
                    source: brute,
                    amount: 40.0,
                },
            },
            ScheduledAction {
                at: 9.0,
                action: ScriptAction::Damage {
                    source: brute,
                    amount: 30.0,
                },
            },
            ScheduledAction {
                at: 10.0,
                action: ScriptAction::Heal {
                    source: medic,
                    amount: 60.0,
                },
            },
            ScheduledAction {
                at: 20.0,
                action: ScriptAction::Despawn { entity: brute },
            },
            ScheduledAction {
                at: 26.0,
                action: ScriptAction::Taunt {
                    source: prowler,
                    duration: 3.0,
                },
            },
        ];

        Self::new(arena, SimClock::new(tick_rate), bus, guard, intruders, script, names)
    }

    /// Assembles a scenario from parts.
    #[must_use]
    pub fn new(
        arena: Arena,
        clock: SimClock,
        bus: EventBus,
        guard: Guard,
        intruders: Vec<Intruder>,
        mut script: Vec<ScheduledAction>,
        names: AHashMap<EntityId, String>,
    ) -> Self {
        script.sort_by(|a, b| b.at.total_cmp(&a.at));
        Self {
            arena,
            clock,
            bus,
            guard,
            intruders,
            script,
            names,
            tally: EventTally::default(),
        }
    }

    /// Gets the guard.
    #[must_use]
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Gets the arena.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Looks up an intruder by name.
    #[must_use]
    pub fn intruder(&self, name: &str) -> Option<&Intruder> {
        self.intruders.iter().find(|i| i.name == name)
    }

    /// Runs for `seconds` of simulated time and summarizes the outcome.
    pub fn run(&mut self, seconds: f32) -> ScenarioSummary {
        let ticks = self.clock.ticks_for(seconds);
        info!(
            "Running {ticks} ticks at {:.0} Hz",
            1.0 / self.clock.fixed_dt()
        );
        for _ in 0..ticks {
            self.step();
        }
        self.summary()
    }

    /// Advances the scenario by one tick.
    pub fn step(&mut self) {
        let dt = self.clock.fixed_dt();
        let now = self.clock.advance();

        self.run_script(now);

        for intruder in &mut self.intruders {
            if let Some(footstep) = intruder.step(&mut self.arena, dt) {
                self.guard.perception.hear_sound(
                    &self.arena,
                    footstep,
                    intruder.footstep_volume(),
                    Some(intruder.id),
                    now,
                );
            }
        }

        self.guard.tick(&mut self.arena, now, dt);
        self.log_events(now);
    }

    fn run_script(&mut self, now: f64) {
        while self.script.last().is_some_and(|a| a.at <= now) {
            let Some(scheduled) = self.script.pop() else {
                break;
            };
            debug!(?scheduled, "script action");

            let mut threat = self.guard.threat.lock();
            match scheduled.action {
                ScriptAction::Damage { source, amount } => {
                    threat.add_damage_threat(&self.arena, source, amount, now);
                },
                ScriptAction::Heal { source, amount } => {
                    threat.add_healing_threat(&self.arena, source, amount, now);
                },
                ScriptAction::Taunt { source, duration } => {
                    threat.taunt(&self.arena, source, duration, now);
                },
                ScriptAction::Despawn { entity } => {
                    self.arena.despawn(entity);
                    self.intruders.retain(|i| i.id != entity);
                },
            }
        }
    }

    fn log_events(&mut self, now: f64) {
        for event in self.bus.drain() {
            self.tally.events += 1;
            match &event {
                AiEvent::Perception { event, .. } => match event {
                    PerceptionEvent::TargetDetected { target, .. } => {
                        self.tally.detections += 1;
                        info!("[{now:6.2}] guard detected {}", self.name(*target));
                    },
                    PerceptionEvent::TargetLost { target, .. } => {
                        info!("[{now:6.2}] guard lost sight of {}", self.name(*target));
                    },
                    PerceptionEvent::SoundHeard { source, volume, .. } => {
                        self.tally.sounds_heard += 1;
                        debug!(
                            "[{now:6.2}] guard heard {} ({volume:.2})",
                            source.map_or_else(|| "something".to_string(), |s| self.name(s))
                        );
                    },
                    PerceptionEvent::SuspicionRaised { target } => {
                        info!("[{now:6.2}] guard is suspicious of {}", self.name(*target));
                    },
                    PerceptionEvent::SearchStarted { position } => {
                        info!("[{now:6.2}] guard searching near {position}");
                    },
                    PerceptionEvent::SearchEnded => {
                        self.tally.searches_ended += 1;
                        info!("[{now:6.2}] guard gave up the search");
                    },
                },
                AiEvent::Threat { event, .. } => match event {
                    ThreatEvent::TargetChanged { old, new } => {
                        self.tally.target_changes += 1;
                        info!(
                            "[{now:6.2}] guard target {} -> {}",
                            self.optional_name(*old),
                            self.optional_name(*new)
                        );
                    },
                    ThreatEvent::AggroGained {
                        source,
                        amount,
                        total,
                    } => {
                        debug!(
                            "[{now:6.2}] {} +{amount:.1} threat ({total:.1})",
                            self.name(*source)
                        );
                    },
                    ThreatEvent::AggroLost { source } => {
                        info!("[{now:6.2}] guard dropped {}", self.name(*source));
                    },
                    ThreatEvent::AggroCleared => {
                        info!("[{now:6.2}] guard threat cleared");
                    },
                },
            }
        }
    }

    fn summary(&self) -> ScenarioSummary {
        let threat = self.guard.threat.lock();
        ScenarioSummary {
            ticks: self.clock.ticks(),
            elapsed: self.clock.now(),
            events: self.tally.events,
            detections: self.tally.detections,
            target_changes: self.tally.target_changes,
            sounds_heard: self.tally.sounds_heard,
            searches_ended: self.tally.searches_ended,
            final_state: self.guard.perception.state(),
            final_target: threat.current_target().map(|id| self.name(id)),
            threat: threat
                .threat_list()
                .into_iter()
                .map(|(entity, value)| ThreatSnapshot {
                    entity,
                    name: self.name(entity),
                    threat: value,
                })
                .collect(),
        }
    }

    fn name(&self, id: EntityId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn optional_name(&self, id: Option<EntityId>) -> String {
        id.map_or_else(|| "none".to_string(), |id| self.name(id))
    }
}
