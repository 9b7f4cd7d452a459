//! Threat (aggro) table with decay and hysteresis-based targeting.
//!
//! Each AI entity owns one [`ThreatTable`]. Other entities feed it threat
//! through damage, healing, or taunts; the table decays stale threat and
//! picks a current target. A challenger only takes over once the switch
//! cooldown has passed and its score beats the incumbent by
//! `switch_threshold`, which keeps near-equal threats from flip-flopping.
//! [`ThreatTable::taunt`] is the only path that bypasses that rule.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use warden_common::EntityId;

use crate::config::ThreatConfig;
use crate::events::{AiEvent, EventBus, Outbox, ThreatEvent};
use crate::world::WorldQuery;

/// Threat table shared between entities that write into it.
pub type SharedThreatTable = Arc<Mutex<ThreatTable>>;

/// Threat contributed by one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatEntry {
    /// Threatening entity
    pub source: EntityId,
    /// Current threat, in `[0, max_threat]`
    pub threat: f32,
    /// Time of the last threat addition
    pub last_update_time: f64,
}

/// Active taunt holding the target.
#[derive(Debug, Clone, Copy)]
struct TauntLock {
    source: EntityId,
    until: f64,
}

/// Per-entity threat table.
#[derive(Debug)]
pub struct ThreatTable {
    owner: EntityId,
    config: ThreatConfig,
    entries: AHashMap<EntityId, ThreatEntry>,
    current_target: Option<EntityId>,
    last_switch_time: Option<f64>,
    taunt: Option<TauntLock>,
    events: Outbox<ThreatEvent>,
}

impl ThreatTable {
    /// Creates an empty table for `owner`.
    #[must_use]
    pub fn new(owner: EntityId, mut config: ThreatConfig) -> Self {
        config.validate();
        Self {
            owner,
            config,
            entries: AHashMap::new(),
            current_target: None,
            last_switch_time: None,
            taunt: None,
            events: Outbox::default(),
        }
    }

    /// Wraps the table for cross-entity writers.
    #[must_use]
    pub fn into_shared(self) -> SharedThreatTable {
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
    pub const fn config(&self) -> &ThreatConfig {
        &self.config
    }

    /// Returns the current target.
    #[must_use]
    pub const fn current_target(&self) -> Option<EntityId> {
        self.current_target
    }

    /// Number of tracked sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no source holds threat.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks if `source` has an entry.
    #[must_use]
    pub fn has_aggro(&self, source: EntityId) -> bool {
        self.entries.contains_key(&source)
    }

    /// Returns the threat held by `source`, or 0.
    #[must_use]
    pub fn aggro(&self, source: EntityId) -> f32 {
        self.entries.get(&source).map_or(0.0, |e| e.threat)
    }

    /// Threat of `source` as a fraction of `max_threat`.
    #[must_use]
    pub fn threat_percent(&self, source: EntityId) -> f32 {
        self.aggro(source) / self.config.max_threat
    }

    /// Looks up the entry for `source`.
    #[must_use]
    pub fn entry(&self, source: EntityId) -> Option<&ThreatEntry> {
        self.entries.get(&source)
    }

    /// Iterates over all entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &ThreatEntry> {
        self.entries.values()
    }

    /// All `(source, threat)` pairs, highest threat first.
    #[must_use]
    pub fn threat_list(&self) -> Vec<(EntityId, f32)> {
        let mut list: Vec<(EntityId, f32)> =
            self.entries.values().map(|e| (e.source, e.threat)).collect();
        list.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        list
    }

    /// Source with the highest raw threat.
    #[must_use]
    pub fn highest_threat(&self) -> Option<(EntityId, f32)> {
        self.threat_list().into_iter().next()
    }

    /// Takes all buffered events.
    pub fn drain_events(&mut self) -> Vec<ThreatEvent> {
        self.events.drain()
    }

    /// Buffered events not yet drained.
    #[must_use]
    pub fn pending_events(&self) -> &[ThreatEvent] {
        self.events.pending()
    }

    /// Adds raw threat from `source`.
    ///
    /// Ignored for self, null, unknown or out-of-range sources and for
    /// non-positive amounts. Returns whether the threat was applied.
    pub fn add_aggro<W: WorldQuery>(
        &mut self,
        world: &W,
        source: EntityId,
        amount: f32,
        now: f64,
    ) -> bool {
        if !amount.is_finite() || amount <= 0.0 || !self.in_reach(world, source) {
            trace!(owner = %self.owner, %source, amount, "aggro rejected");
            return false;
        }

        let max_threat = self.config.max_threat;
        let entry = self.entries.entry(source).or_insert(ThreatEntry {
            source,
            threat: 0.0,
            last_update_time: now,
        });
        let before = entry.threat;
        entry.threat = (entry.threat + amount).min(max_threat);
        entry.last_update_time = now;
        let total = entry.threat;

        self.emit(ThreatEvent::AggroGained {
            source,
            amount: total - before,
            total,
        });
        self.reevaluate(world, now);
        true
    }

    /// Adds threat for `damage` dealt by `source`.
    pub fn add_damage_threat<W: WorldQuery>(
        &mut self,
        world: &W,
        source: EntityId,
        damage: f32,
        now: f64,
    ) -> bool {
        let amount = damage * self.config.damage_threat_multiplier;
        self.add_aggro(world, source, amount, now)
    }

    /// Adds threat for `heal_amount` of healing done by `source`.
    pub fn add_healing_threat<W: WorldQuery>(
        &mut self,
        world: &W,
        source: EntityId,
        heal_amount: f32,
        now: f64,
    ) -> bool {
        let amount = heal_amount * self.config.healing_threat_multiplier;
        self.add_aggro(world, source, amount, now)
    }

    /// Forces `source` to become the target immediately.
    ///
    /// Adds `max_threat * taunt_multiplier` threat, then switches regardless
    /// of cooldown or hysteresis. The taunter keeps the target until
    /// `now + duration` unless it leaves the table.
    pub fn taunt<W: WorldQuery>(
        &mut self,
        world: &W,
        source: EntityId,
        duration: f32,
        now: f64,
    ) -> bool {
        if !self.in_reach(world, source) {
            return false;
        }
        let amount = self.config.max_threat * self.config.taunt_multiplier;
        self.add_aggro(world, source, amount, now);
        if !self.entries.contains_key(&source) {
            return false;
        }

        self.taunt = Some(TauntLock {
            source,
            until: now + f64::from(duration.max(0.0)),
        });
        if self.current_target == Some(source) {
            self.last_switch_time = Some(now);
        } else {
            self.switch_to(Some(source), now);
        }
        debug!(owner = %self.owner, %source, duration, "taunted");
        true
    }

    /// Removes `source` from the table.
    pub fn clear_aggro<W: WorldQuery>(&mut self, world: &W, source: EntityId, now: f64) {
        let was_target = self.current_target == Some(source);
        if self.remove_entry(source) && was_target {
            self.reevaluate(world, now);
        }
    }

    /// Empties the table.
    pub fn clear_all(&mut self) {
        let previous = self.current_target.take();
        self.entries.clear();
        self.taunt = None;
        self.emit(ThreatEvent::AggroCleared);
        if previous.is_some() {
            self.emit(ThreatEvent::TargetChanged {
                old: previous,
                new: None,
            });
        }
    }

    /// Scales `source`'s threat down by `percent` (0..=1).
    pub fn reduce_aggro(&mut self, source: EntityId, percent: f32) {
        if let Some(entry) = self.entries.get_mut(&source) {
            entry.threat *= 1.0 - clamp01(percent);
        }
    }

    /// Moves `percent` of `from`'s threat onto `to`.
    ///
    /// `to` goes through the normal [`add_aggro`](Self::add_aggro) checks.
    /// `from` only loses what `to` actually gained under the `max_threat`
    /// cap. Returns that amount.
    pub fn transfer_aggro<W: WorldQuery>(
        &mut self,
        world: &W,
        from: EntityId,
        to: EntityId,
        percent: f32,
        now: f64,
    ) -> f32 {
        if from == to {
            return 0.0;
        }
        let amount = self.aggro(from) * clamp01(percent);
        let before = self.aggro(to);
        if amount <= 0.0 || !self.add_aggro(world, to, amount, now) {
            return 0.0;
        }
        // Only what `to` could absorb under the cap leaves `from`
        let moved = self.aggro(to) - before;
        if let Some(entry) = self.entries.get_mut(&from) {
            entry.threat = (entry.threat - moved).max(0.0);
        }
        self.reevaluate(world, now);
        moved
    }

    /// Advances the table by one fixed step.
    ///
    /// Prunes dead sources, decays stale threat, then re-evaluates the
    /// target against the post-decay values.
    pub fn update<W: WorldQuery>(&mut self, world: &W, now: f64, dt: f32) {
        self.prune_dead(world);
        self.decay(now, dt);
        self.reevaluate(world, now);
    }

    fn in_reach<W: WorldQuery>(&self, world: &W, source: EntityId) -> bool {
        if !source.is_valid() || source == self.owner {
            return false;
        }
        world
            .distance_between(self.owner, source)
            .is_some_and(|d| d <= self.config.aggro_range)
    }

    fn prune_dead<W: WorldQuery>(&mut self, world: &W) {
        let dead: Vec<EntityId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !world.is_alive(*id))
            .collect();
        for source in dead {
            self.remove_entry(source);
        }
    }

    fn decay(&mut self, now: f64, dt: f32) {
        let delay = f64::from(self.config.aggro_decay_delay);
        let rate = self.config.aggro_decay_rate;
        let dt = dt.max(0.0);

        let mut expired = Vec::new();
        for entry in self.entries.values_mut() {
            let past_delay = now - entry.last_update_time - delay;
            if past_delay < 0.0 {
                continue;
            }
            // The first decaying step only covers the time after the delay
            let step = (past_delay as f32).min(dt);
            entry.threat -= rate * step;
            if entry.threat <= 0.0 {
                entry.threat = 0.0;
                expired.push(entry.source);
            }
        }

        for source in expired {
            trace!(owner = %self.owner, %source, "threat decayed away");
            self.remove_entry(source);
        }
    }

    fn remove_entry(&mut self, source: EntityId) -> bool {
        if self.entries.remove(&source).is_none() {
            return false;
        }
        if self.taunt.is_some_and(|t| t.source == source) {
            self.taunt = None;
        }
        self.emit(ThreatEvent::AggroLost { source });
        true
    }

    fn reevaluate<W: WorldQuery>(&mut self, world: &W, now: f64) {
        if self.entries.is_empty() {
            if self.current_target.is_some() {
                self.switch_to(None, now);
            }
            return;
        }

        let incumbent = self
            .current_target
            .filter(|id| self.entries.contains_key(id));
        let Some((best, best_score)) = self.best_candidate(world, incumbent) else {
            return;
        };
        if Some(best) == incumbent {
            return;
        }

        if let Some(current) = incumbent {
            if self
                .taunt
                .is_some_and(|t| t.source == current && now < t.until)
            {
                return;
            }
            let cooldown_elapsed = self
                .last_switch_time
                .map_or(true, |t| now - t >= f64::from(self.config.switch_cooldown));
            let required = self.aggro(current) * self.config.switch_threshold;
            if !cooldown_elapsed || best_score < required {
                return;
            }
        }

        self.switch_to(Some(best), now);
    }

    fn best_candidate<W: WorldQuery>(
        &self,
        world: &W,
        incumbent: Option<EntityId>,
    ) -> Option<(EntityId, f32)> {
        self.entries
            .values()
            .map(|entry| (entry.source, self.effective_score(world, entry)))
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| (Some(a.0) == incumbent).cmp(&(Some(b.0) == incumbent)))
                    .then_with(|| b.0.cmp(&a.0))
            })
    }

    fn effective_score<W: WorldQuery>(&self, world: &W, entry: &ThreatEntry) -> f32 {
        if !self.config.prioritize_closest {
            return entry.threat;
        }
        let bonus = world
            .distance_between(self.owner, entry.source)
            .map_or(0.0, |d| {
                (self.config.aggro_range - d) * self.config.proximity_threat_multiplier
            });
        entry.threat + bonus
    }

    fn switch_to(&mut self, new: Option<EntityId>, now: f64) {
        let old = self.current_target;
        self.current_target = new;
        self.last_switch_time = Some(now);
        debug!(owner = %self.owner, ?old, ?new, "target changed");
        self.emit(ThreatEvent::TargetChanged { old, new });
    }

    fn emit(&mut self, event: ThreatEvent) {
        let owner = self.owner;
        self.events
            .push(event, |event| AiEvent::Threat { owner, event });
    }
}

fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MockWorld;
    use glam::Vec3;
    use proptest::prelude::*;

    const OWNER: EntityId = EntityId::from_raw(1);
    const A: EntityId = EntityId::from_raw(10);
    const B: EntityId = EntityId::from_raw(11);
    const C: EntityId = EntityId::from_raw(12);

    fn world() -> MockWorld {
        let mut world = MockWorld::new();
        world.place(OWNER, Vec3::ZERO);
        world.place(A, Vec3::new(5.0, 0.0, 0.0));
        world.place(B, Vec3::new(0.0, 0.0, 5.0));
        world.place(C, Vec3::new(-5.0, 0.0, 0.0));
        world
    }

    fn roomy_config() -> ThreatConfig {
        ThreatConfig {
            max_threat: 200.0,
            ..ThreatConfig::default()
        }
    }

    #[test]
    fn test_literal_scenario() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());

        assert!(table.add_aggro(&world, A, 60.0, 0.0));
        assert_eq!(table.current_target(), Some(A));
        assert_eq!(table.aggro(A), 60.0);

        // 80 >= 60 * 1.2 and the cooldown has passed
        assert!(table.add_aggro(&world, B, 80.0, 1.0));
        assert_eq!(table.current_target(), Some(B));

        for t in 2..=5 {
            table.update(&world, f64::from(t), 1.0);
        }
        assert!((table.aggro(A) - 50.0).abs() < 1e-4);
        assert!((table.aggro(B) - 75.0).abs() < 1e-4);
        assert_eq!(table.current_target(), Some(B));
    }

    #[test]
    fn test_hysteresis_blocks_small_lead() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, roomy_config());

        table.add_aggro(&world, A, 100.0, 0.0);
        table.add_aggro(&world, B, 110.0, 0.0);
        assert_eq!(table.current_target(), Some(A));

        table.update(&world, 2.0, 0.1);
        // 110 < 100 * 1.2
        assert_eq!(table.current_target(), Some(A));
    }

    #[test]
    fn test_hysteresis_allows_large_lead() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, roomy_config());

        table.add_aggro(&world, A, 100.0, 0.0);
        table.add_aggro(&world, B, 130.0, 0.0);
        // Cooldown still running
        assert_eq!(table.current_target(), Some(A));

        table.drain_events();
        table.update(&world, 2.0, 0.1);
        assert_eq!(table.current_target(), Some(B));
        assert_eq!(
            table.drain_events(),
            vec![ThreatEvent::TargetChanged {
                old: Some(A),
                new: Some(B)
            }]
        );
    }

    #[test]
    fn test_taunt_overrides_higher_threat_and_cooldown() {
        let world = world();
        let config = ThreatConfig {
            max_threat: 200.0,
            taunt_multiplier: 0.1,
            ..ThreatConfig::default()
        };
        let mut table = ThreatTable::new(OWNER, config);

        table.add_aggro(&world, A, 80.0, 0.0);
        table.add_aggro(&world, B, 150.0, 0.1);
        assert_eq!(table.current_target(), Some(A));

        assert!(table.taunt(&world, C, 5.0, 0.2));
        assert_eq!(table.current_target(), Some(C));
        assert!(table.aggro(C) < table.aggro(B));

        // Held while the taunt lasts, even past the cooldown
        table.update(&world, 2.0, 0.1);
        assert_eq!(table.current_target(), Some(C));

        table.update(&world, 6.0, 0.1);
        assert_eq!(table.current_target(), Some(B));
    }

    #[test]
    fn test_taunt_rejected_out_of_range() {
        let mut world = world();
        world.move_to(C, Vec3::new(100.0, 0.0, 0.0));
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());

        assert!(!table.taunt(&world, C, 5.0, 0.0));
        assert!(table.is_empty());
        assert_eq!(table.current_target(), None);
    }

    #[test]
    fn test_range_and_self_rejection() {
        let mut world = world();
        world.move_to(A, Vec3::new(20.0, 0.0, 0.0));
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());

        assert!(!table.add_aggro(&world, A, 50.0, 0.0));
        assert!(!table.add_aggro(&world, OWNER, 50.0, 0.0));
        assert!(!table.add_aggro(&world, EntityId::NULL, 50.0, 0.0));
        assert!(!table.add_aggro(&world, B, -5.0, 0.0));
        assert!(!table.add_aggro(&world, B, f32::NAN, 0.0));

        assert!(table.is_empty());
        assert!(table.pending_events().is_empty());
        assert_eq!(table.current_target(), None);
    }

    #[test]
    fn test_decay_waits_for_delay_then_removes() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 10.0, 0.0);
        table.drain_events();

        table.update(&world, 2.0, 1.0);
        assert_eq!(table.aggro(A), 10.0);

        let mut previous = table.aggro(A);
        let mut t = 2.0;
        while table.has_aggro(A) {
            t += 0.5;
            table.update(&world, t, 0.5);
            assert!(table.aggro(A) <= previous);
            previous = table.aggro(A);
            assert!(t < 10.0, "threat never decayed away");
        }

        assert_eq!(table.current_target(), None);
        assert_eq!(
            table.drain_events(),
            vec![
                ThreatEvent::AggroLost { source: A },
                ThreatEvent::TargetChanged {
                    old: Some(A),
                    new: None
                },
            ]
        );
    }

    #[test]
    fn test_clear_aggro_of_target_reevaluates() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 90.0, 0.0);
        table.add_aggro(&world, B, 40.0, 0.0);
        table.drain_events();

        table.clear_aggro(&world, A, 0.5);
        assert_eq!(table.current_target(), Some(B));
        assert_eq!(
            table.drain_events(),
            vec![
                ThreatEvent::AggroLost { source: A },
                ThreatEvent::TargetChanged {
                    old: Some(A),
                    new: Some(B)
                },
            ]
        );

        // Absent source is a no-op
        table.clear_aggro(&world, C, 0.6);
        assert!(table.drain_events().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 30.0, 0.0);
        table.add_aggro(&world, B, 20.0, 0.0);
        table.drain_events();

        table.clear_all();
        assert!(table.is_empty());
        assert_eq!(table.current_target(), None);
        assert_eq!(
            table.drain_events(),
            vec![
                ThreatEvent::AggroCleared,
                ThreatEvent::TargetChanged {
                    old: Some(A),
                    new: None
                },
            ]
        );
    }

    #[test]
    fn test_reduce_aggro_clamps_percent() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 80.0, 0.0);

        table.reduce_aggro(A, 0.25);
        assert!((table.aggro(A) - 60.0).abs() < 1e-4);

        table.reduce_aggro(A, 3.0);
        assert_eq!(table.aggro(A), 0.0);

        // Absent source
        table.reduce_aggro(B, 0.5);
        assert!(!table.has_aggro(B));
    }

    #[test]
    fn test_transfer_aggro() {
        let mut world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 80.0, 0.0);

        let moved = table.transfer_aggro(&world, A, B, 0.5, 0.5);
        assert!((moved - 40.0).abs() < 1e-4);
        assert!((table.aggro(A) - 40.0).abs() < 1e-4);
        assert!((table.aggro(B) - 40.0).abs() < 1e-4);

        world.move_to(C, Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(table.transfer_aggro(&world, A, C, 1.0, 0.6), 0.0);
        assert!((table.aggro(A) - 40.0).abs() < 1e-4);
        assert!(!table.has_aggro(C));
    }

    #[test]
    fn test_transfer_aggro_respects_cap() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 80.0, 0.0);
        table.add_aggro(&world, B, 90.0, 0.0);

        // B can only absorb 10 of the 40 requested
        let moved = table.transfer_aggro(&world, A, B, 0.5, 0.5);
        assert!((moved - 10.0).abs() < 1e-4);
        assert_eq!(table.aggro(B), 100.0);
        assert!((table.aggro(A) - 70.0).abs() < 1e-4);
    }

    #[test]
    fn test_threat_list_is_descending() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 10.0, 0.0);
        table.add_aggro(&world, B, 70.0, 0.0);
        table.add_aggro(&world, C, 40.0, 0.0);

        assert_eq!(
            table.threat_list(),
            vec![(B, 70.0), (C, 40.0), (A, 10.0)]
        );
        assert_eq!(table.highest_threat(), Some((B, 70.0)));
        assert!((table.threat_percent(B) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_damage_and_healing_multipliers() {
        let world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_damage_threat(&world, A, 20.0, 0.0);
        table.add_healing_threat(&world, B, 20.0, 0.0);

        assert_eq!(table.aggro(A), 20.0);
        assert_eq!(table.aggro(B), 10.0);
    }

    #[test]
    fn test_prioritize_closest_bonus() {
        let mut world = world();
        world.move_to(A, Vec3::new(10.0, 0.0, 0.0));
        world.move_to(B, Vec3::new(1.0, 0.0, 0.0));

        let config = ThreatConfig {
            switch_cooldown: 0.0,
            switch_threshold: 1.0,
            ..ThreatConfig::default()
        };

        let mut plain = ThreatTable::new(OWNER, config.clone());
        plain.add_aggro(&world, A, 50.0, 0.0);
        plain.add_aggro(&world, B, 45.0, 0.0);
        assert_eq!(plain.current_target(), Some(A));

        let mut closest = ThreatTable::new(
            OWNER,
            ThreatConfig {
                prioritize_closest: true,
                ..config
            },
        );
        closest.add_aggro(&world, A, 50.0, 0.0);
        // A: 50 + 5, B: 45 + 14
        closest.add_aggro(&world, B, 45.0, 0.0);
        assert_eq!(closest.current_target(), Some(B));
    }

    #[test]
    fn test_dead_sources_are_pruned() {
        let mut world = world();
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.add_aggro(&world, A, 60.0, 0.0);
        table.add_aggro(&world, B, 20.0, 0.0);
        table.drain_events();

        world.despawn(A);
        table.update(&world, 0.1, 0.1);

        assert!(!table.has_aggro(A));
        assert_eq!(table.current_target(), Some(B));
        assert_eq!(
            table.drain_events(),
            vec![
                ThreatEvent::AggroLost { source: A },
                ThreatEvent::TargetChanged {
                    old: Some(A),
                    new: Some(B)
                },
            ]
        );
    }

    #[test]
    fn test_shared_table_and_bus() {
        let world = world();
        let bus = EventBus::new(16);
        let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
        table.attach_bus(&bus);
        let shared = table.into_shared();

        let writer = Arc::clone(&shared);
        writer.lock().add_damage_threat(&world, A, 25.0, 0.0);

        assert_eq!(shared.lock().current_target(), Some(A));
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.owner() == OWNER));
    }

    proptest! {
        #[test]
        fn prop_threat_never_exceeds_max(amounts in prop::collection::vec(0.0f32..500.0, 1..40)) {
            let world = world();
            let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
            for (i, amount) in amounts.iter().enumerate() {
                table.add_aggro(&world, A, *amount, i as f64 * 0.1);
                prop_assert!(table.aggro(A) <= table.config().max_threat);
                prop_assert!(table.aggro(A) >= 0.0);
            }
        }

        #[test]
        fn prop_decay_is_monotonic(amount in 1.0f32..100.0, steps in 1usize..200) {
            let world = world();
            let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
            table.add_aggro(&world, A, amount, 0.0);
            let mut previous = table.aggro(A);
            for step in 1..=steps {
                table.update(&world, step as f64 * 0.1, 0.1);
                let current = table.aggro(A);
                prop_assert!(current <= previous);
                previous = current;
            }
        }

        #[test]
        fn prop_target_is_always_tracked(ops in prop::collection::vec((0u64..4, 0.0f32..80.0), 1..30)) {
            let world = world();
            let mut table = ThreatTable::new(OWNER, ThreatConfig::default());
            let mut now = 0.0;
            for (who, amount) in ops {
                let source = EntityId::from_raw(10 + who);
                table.add_aggro(&world, source, amount, now);
                now += 0.7;
                table.update(&world, now, 0.7);
                if let Some(target) = table.current_target() {
                    prop_assert!(table.has_aggro(target));
                }
                prop_assert_eq!(table.is_empty(), table.current_target().is_none());
            }
        }
    }
}
