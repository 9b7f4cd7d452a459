//! Vision and hearing driven awareness with an alert state machine.
//!
//! A [`PerceptionTracker`] keeps an awareness score per observed entity.
//! Vision raises it on a throttled pass, time without vision lowers it, and
//! crossing the suspicion and detection thresholds drives the tracker
//! through [`AlertState`]:
//!
//! ```text
//! Idle --sound--> Suspicious
//!   any --detection--> Alert --target lost--> Searching --timeout--> Idle
//! ```

use ahash::AHashMap;
use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use warden_common::{linear_falloff, within_cone, EntityId, UP};

use crate::config::PerceptionConfig;
use crate::events::{AiEvent, EventBus, Outbox, PerceptionEvent};
use crate::world::WorldQuery;

/// Perception tracker shared between entities that write into it.
pub type SharedPerceptionTracker = Arc<Mutex<PerceptionTracker>>;

/// Alertness of the owning entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertState {
    /// Nothing noticed
    #[default]
    Idle,
    /// Heard something
    Suspicious,
    /// A target is fully detected
    Alert,
    /// Looking for a lost target
    Searching,
}

/// Awareness state for one observed entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceivedTarget {
    /// Observed entity
    pub entity: EntityId,
    /// Awareness in `[0, detection_threshold]`
    pub awareness: f32,
    /// Time the entity was last seen
    pub last_seen_time: f64,
    /// Where the entity was last seen
    pub last_seen_position: Vec3,
    /// Seen during the current tick
    pub is_currently_visible: bool,
    /// Suspicion threshold has been crossed
    pub is_suspicious: bool,
    /// Detection threshold has been crossed
    pub is_detected: bool,
}

impl PerceivedTarget {
    fn new(entity: EntityId, position: Vec3, now: f64) -> Self {
        Self {
            entity,
            awareness: 0.0,
            last_seen_time: now,
            last_seen_position: position,
            is_currently_visible: false,
            is_suspicious: false,
            is_detected: false,
        }
    }
}

/// A remembered sound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeardSound {
    /// Sound origin
    pub position: Vec3,
    /// Volume after distance falloff
    pub volume: f32,
    /// Time the sound was heard
    pub time: f64,
    /// Emitting entity, if known
    pub source: Option<EntityId>,
}

/// Per-entity perception state.
#[derive(Debug)]
pub struct PerceptionTracker {
    owner: EntityId,
    config: PerceptionConfig,
    targets: AHashMap<EntityId, PerceivedTarget>,
    heard_sounds: Vec<HeardSound>,
    state: AlertState,
    current_target: Option<EntityId>,
    last_known_position: Option<Vec3>,
    search_timer: f32,
    last_vision_pass: Option<f64>,
    events: Outbox<PerceptionEvent>,
}

impl PerceptionTracker {
    /// Creates an idle tracker for `owner`.
    #[must_use]
    pub fn new(owner: EntityId, mut config: PerceptionConfig) -> Self {
        config.validate();
        Self {
            owner,
            config,
            targets: AHashMap::new(),
            heard_sounds: Vec::new(),
            state: AlertState::Idle,
            current_target: None,
            last_known_position: None,
            search_timer: 0.0,
            last_vision_pass: None,
            events: Outbox::default(),
        }
    }

    /// Wraps the tracker for cross-entity writers.
    #[must_use]
    pub fn into_shared(self) -> SharedPerceptionTracker {
        Arc::new(Mutex::new(self))
    }

    /// Publishes every future event on `bus` as well.
    ///
    /// Events are still buffered locally, so the owner must keep calling
    /// `drain_events` each tick even when it only reads the bus.
    pub fn attach_bus(&mut self, bus: &EventBus) {
        self.events.attach(bus.sender());
    }

    /// Returns the owning entity.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// Current alert state.
    #[must_use]
    pub const fn state(&self) -> AlertState {
        self.state
    }

    /// Fully detected target, kept while searching for it.
    #[must_use]
    pub const fn current_target(&self) -> Option<EntityId> {
        self.current_target
    }

    /// Last position worth investigating.
    #[must_use]
    pub const fn last_known_position(&self) -> Option<Vec3> {
        self.last_known_position
    }

    /// Seconds of search remaining.
    #[must_use]
    pub const fn search_timer(&self) -> f32 {
        self.search_timer
    }

    /// Awareness of `target`, or 0 if untracked.
    #[must_use]
    pub fn awareness(&self, target: EntityId) -> f32 {
        self.targets.get(&target).map_or(0.0, |t| t.awareness)
    }

    /// Awareness of `target` as a fraction of the detection threshold.
    #[must_use]
    pub fn awareness_percent(&self, target: EntityId) -> f32 {
        self.awareness(target) / self.config.detection_threshold
    }

    /// Checks if `target` is tracked and suspicious.
    #[must_use]
    pub fn is_suspicious(&self, target: EntityId) -> bool {
        self.targets.get(&target).is_some_and(|t| t.is_suspicious)
    }

    /// Checks if `target` is tracked and detected.
    #[must_use]
    pub fn is_detected(&self, target: EntityId) -> bool {
        self.targets.get(&target).is_some_and(|t| t.is_detected)
    }

    /// Looks up the tracking state for `target`.
    #[must_use]
    pub fn target(&self, target: EntityId) -> Option<&PerceivedTarget> {
        self.targets.get(&target)
    }

    /// Iterates over all tracked targets in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = &PerceivedTarget> {
        self.targets.values()
    }

    /// Sounds still in memory, oldest first.
    #[must_use]
    pub fn heard_sounds(&self) -> &[HeardSound] {
        &self.heard_sounds
    }

    /// Most recently heard sound still in memory.
    #[must_use]
    pub fn most_recent_sound(&self) -> Option<&HeardSound> {
        self.heard_sounds.last()
    }

    /// Takes all buffered events.
    pub fn drain_events(&mut self) -> Vec<PerceptionEvent> {
        self.events.drain()
    }

    /// Buffered events not yet drained.
    #[must_use]
    pub fn pending_events(&self) -> &[PerceptionEvent] {
        self.events.pending()
    }

    /// Advances the tracker by one tick.
    ///
    /// Order matters: the search countdown runs first, then stale entities
    /// and sounds are pruned, the vision pass runs if due, unseen targets
    /// decay, and only then are the visibility flags cleared.
    pub fn update<W: WorldQuery>(&mut self, world: &W, now: f64, dt: f32) {
        let dt = dt.max(0.0);

        self.tick_search(dt);
        self.prune(world, now);

        let due = self
            .last_vision_pass
            .map_or(true, |last| now - last >= f64::from(self.config.perception_update_rate));
        if due {
            self.last_vision_pass = Some(now);
            self.vision_pass(world, now);
        }

        self.decay_unseen(dt);
        for target in self.targets.values_mut() {
            target.is_currently_visible = false;
        }

        self.refresh_alert(world);
    }

    /// Registers a sound at `position`.
    ///
    /// Returns whether the sound was loud enough to register after distance
    /// falloff.
    pub fn hear_sound<W: WorldQuery>(
        &mut self,
        world: &W,
        position: Vec3,
        volume: f32,
        source: Option<EntityId>,
        now: f64,
    ) -> bool {
        if !volume.is_finite() || !position.is_finite() {
            return false;
        }
        let Some(origin) = world.position(self.owner) else {
            return false;
        };
        let distance = world.distance(origin, position);
        let effective = volume * linear_falloff(distance, self.config.hearing_range);
        if effective < self.config.hearing_threshold || effective <= 0.0 {
            trace!(owner = %self.owner, effective, "sound too quiet");
            return false;
        }

        self.heard_sounds.push(HeardSound {
            position,
            volume: effective,
            time: now,
            source,
        });
        self.emit(PerceptionEvent::SoundHeard {
            position,
            volume: effective,
            source,
        });

        match self.state {
            AlertState::Idle => {
                debug!(owner = %self.owner, "sound raised suspicion");
                self.state = AlertState::Suspicious;
                self.last_known_position = Some(position);
            },
            AlertState::Suspicious => {
                self.last_known_position = Some(position);
            },
            AlertState::Searching => {
                debug!(owner = %self.owner, "sound extended search");
                self.last_known_position = Some(position);
                self.search_timer = self.config.search_duration;
            },
            AlertState::Alert => {},
        }
        true
    }

    /// Forces full detection of `target`, bypassing vision.
    ///
    /// Awareness is always reset to the detection threshold. Re-alerting the
    /// current target emits nothing.
    pub fn alert_to_target<W: WorldQuery>(&mut self, world: &W, target: EntityId, now: f64) {
        if !target.is_valid() || target == self.owner {
            return;
        }
        let Some(position) = world.position(target) else {
            return;
        };
        let detection = self.config.detection_threshold;
        if self.state == AlertState::Alert && self.current_target == Some(target) {
            if let Some(entry) = self.targets.get_mut(&target).filter(|t| t.is_detected) {
                entry.awareness = detection;
                entry.last_seen_position = position;
                entry.last_seen_time = now;
                self.last_known_position = Some(position);
                return;
            }
        }

        let entry = self
            .targets
            .entry(target)
            .or_insert_with(|| PerceivedTarget::new(target, position, now));
        entry.awareness = detection;
        entry.last_seen_position = position;
        entry.last_seen_time = now;
        let newly_suspicious = !entry.is_suspicious;
        entry.is_suspicious = true;
        entry.is_detected = true;

        if newly_suspicious {
            self.emit(PerceptionEvent::SuspicionRaised { target });
        }
        self.enter_alert(target, position);
    }

    /// Stops tracking `target`.
    ///
    /// Reverts to Idle if it was the current target. Absent targets are
    /// ignored.
    pub fn forget_target(&mut self, target: EntityId) {
        self.targets.remove(&target);
        if self.current_target == Some(target) {
            self.reset_state();
        }
    }

    /// Stops tracking everything and reverts to Idle.
    pub fn forget_all(&mut self) {
        self.targets.clear();
        self.heard_sounds.clear();
        self.reset_state();
    }

    /// Checks whether `target` is visible right now, without side effects.
    #[must_use]
    pub fn can_currently_see<W: WorldQuery>(&self, world: &W, target: EntityId) -> bool {
        if target == self.owner {
            return false;
        }
        let (Some(origin), Some(position)) = (world.position(self.owner), world.position(target))
        else {
            return false;
        };
        let distance = world.distance(origin, position);
        distance <= self.config.sight_range && self.can_see_from(world, origin, position, distance)
    }

    fn can_see_from<W: WorldQuery>(
        &self,
        world: &W,
        origin: Vec3,
        position: Vec3,
        distance: f32,
    ) -> bool {
        if distance > self.config.peripheral_range {
            let Some(forward) = world.forward(self.owner) else {
                return false;
            };
            if !within_cone(forward, position - origin, self.config.sight_angle) {
                return false;
            }
        }
        let eye = origin + UP * self.config.eye_height;
        let aim = position + UP * self.config.target_center_offset;
        world.line_of_sight_clear(eye, aim)
    }

    fn tick_search(&mut self, dt: f32) {
        if self.state != AlertState::Searching {
            return;
        }
        self.search_timer -= dt;
        if self.search_timer <= 0.0 {
            debug!(owner = %self.owner, "search ended");
            self.search_timer = 0.0;
            self.state = AlertState::Idle;
            self.current_target = None;
            self.emit(PerceptionEvent::SearchEnded);
        }
    }

    fn prune<W: WorldQuery>(&mut self, world: &W, now: f64) {
        let dead: Vec<EntityId> = self
            .targets
            .keys()
            .copied()
            .filter(|id| !world.is_alive(*id))
            .collect();
        for target in dead {
            self.remove_target(target);
        }

        let memory = f64::from(self.config.memory_duration);
        self.heard_sounds.retain(|sound| now - sound.time <= memory);
    }

    fn vision_pass<W: WorldQuery>(&mut self, world: &W, now: f64) {
        let Some(origin) = world.position(self.owner) else {
            return;
        };
        let sight_range = self.config.sight_range;

        for target in world.entities_within_radius(origin, sight_range) {
            if target == self.owner || !target.is_valid() {
                continue;
            }
            let Some(position) = world.position(target) else {
                continue;
            };
            let distance = world.distance(origin, position);
            if distance > sight_range || !self.can_see_from(world, origin, position, distance) {
                continue;
            }
            let gain = self.config.awareness_gain_rate
                * linear_falloff(distance, sight_range)
                * self.config.perception_update_rate;
            self.observe(target, position, gain, now);
        }
    }

    fn observe(&mut self, target: EntityId, position: Vec3, gain: f32, now: f64) {
        let suspicion = self.config.suspicion_threshold;
        let detection = self.config.detection_threshold;

        let entry = self
            .targets
            .entry(target)
            .or_insert_with(|| PerceivedTarget::new(target, position, now));
        entry.is_currently_visible = true;
        entry.last_seen_position = position;
        entry.last_seen_time = now;
        entry.awareness = (entry.awareness + gain).min(detection);

        let raise_suspicion = !entry.is_suspicious && entry.awareness >= suspicion;
        let detect = !entry.is_detected && entry.awareness >= detection;
        entry.is_suspicious |= raise_suspicion || detect;
        entry.is_detected |= detect;

        if raise_suspicion {
            self.emit(PerceptionEvent::SuspicionRaised { target });
        }
        if detect {
            self.enter_alert(target, position);
        }
    }

    fn decay_unseen(&mut self, dt: f32) {
        let step = self.config.awareness_decay_rate * dt;

        let mut faded = Vec::new();
        for target in self.targets.values_mut() {
            if target.is_currently_visible {
                continue;
            }
            target.awareness -= step;
            if target.awareness <= 0.0 {
                target.awareness = 0.0;
                faded.push(target.entity);
            }
        }

        for target in faded {
            trace!(owner = %self.owner, %target, "awareness faded");
            self.remove_target(target);
        }
    }

    fn remove_target(&mut self, target: EntityId) {
        let Some(entry) = self.targets.remove(&target) else {
            return;
        };
        if entry.is_detected && self.current_target == Some(target) {
            let position = entry.last_seen_position;
            debug!(owner = %self.owner, %target, "target lost");
            self.last_known_position = Some(position);
            self.emit(PerceptionEvent::TargetLost {
                target,
                last_known_position: position,
            });
            self.begin_search(position);
        }
    }

    fn refresh_alert<W: WorldQuery>(&mut self, world: &W) {
        if self.state != AlertState::Alert {
            return;
        }
        let tracked = self
            .current_target
            .and_then(|id| self.targets.get(&id))
            .map(|entry| (entry.entity, entry.last_seen_position));
        match tracked {
            Some((entity, last_seen)) => {
                self.last_known_position = Some(world.position(entity).unwrap_or(last_seen));
            },
            None => {
                let position = self.last_known_position.unwrap_or(Vec3::ZERO);
                self.begin_search(position);
            },
        }
    }

    fn enter_alert(&mut self, target: EntityId, position: Vec3) {
        debug!(owner = %self.owner, %target, "target detected");
        self.current_target = Some(target);
        self.state = AlertState::Alert;
        self.last_known_position = Some(position);
        self.search_timer = 0.0;
        self.emit(PerceptionEvent::TargetDetected { target, position });
    }

    fn begin_search(&mut self, position: Vec3) {
        debug!(owner = %self.owner, ?position, "search started");
        self.state = AlertState::Searching;
        self.search_timer = self.config.search_duration;
        self.emit(PerceptionEvent::SearchStarted { position });
    }

    fn reset_state(&mut self) {
        self.state = AlertState::Idle;
        self.current_target = None;
        self.last_known_position = None;
        self.search_timer = 0.0;
    }

    fn emit(&mut self, event: PerceptionEvent) {
        let owner = self.owner;
        self.events
            .push(event, |event| AiEvent::Perception { owner, event });
    }
}
