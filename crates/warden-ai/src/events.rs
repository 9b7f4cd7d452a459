//! AI notifications and the event bus that carries them.
//!
//! Components buffer their own events in an outbox (see
//! [`ThreatTable::drain_events`](crate::threat::ThreatTable::drain_events)).
//! When attached to an [`EventBus`] they also publish every event there,
//! tagged with the owning entity.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use warden_common::EntityId;

/// Notifications emitted by a threat table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThreatEvent {
    /// The selected target changed
    TargetChanged {
        /// Previous target
        old: Option<EntityId>,
        /// New target
        new: Option<EntityId>,
    },
    /// Threat was added for a source
    AggroGained {
        /// Source entity
        source: EntityId,
        /// Amount actually added after capping
        amount: f32,
        /// Threat value after the addition
        total: f32,
    },
    /// A source dropped out of the table
    AggroLost {
        /// Source entity
        source: EntityId,
    },
    /// The whole table was cleared
    AggroCleared,
}

/// Notifications emitted by a perception tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerceptionEvent {
    /// A target crossed the detection threshold
    TargetDetected {
        /// Detected entity
        target: EntityId,
        /// Where it was when detected
        position: Vec3,
    },
    /// The detected target was lost from view
    TargetLost {
        /// Lost entity
        target: EntityId,
        /// Last confirmed position
        last_known_position: Vec3,
    },
    /// A sound passed the hearing threshold
    SoundHeard {
        /// Sound origin
        position: Vec3,
        /// Volume after distance falloff
        volume: f32,
        /// Emitting entity, if known
        source: Option<EntityId>,
    },
    /// A target crossed the suspicion threshold
    SuspicionRaised {
        /// Suspicious entity
        target: EntityId,
    },
    /// A search began at the given position
    SearchStarted {
        /// Position being searched
        position: Vec3,
    },
    /// The search timed out
    SearchEnded,
}

/// Event tagged with the AI entity that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiEvent {
    /// Threat table notification
    Threat {
        /// Owning AI entity
        owner: EntityId,
        /// The event
        event: ThreatEvent,
    },
    /// Perception notification
    Perception {
        /// Owning AI entity
        owner: EntityId,
        /// The event
        event: PerceptionEvent,
    },
}

impl AiEvent {
    /// Returns the AI entity that produced this event.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        match self {
            Self::Threat { owner, .. } | Self::Perception { owner, .. } => *owner,
        }
    }
}

/// Event bus for broadcasting AI events to a consumer.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<AiEvent>,
    /// Receiver for collecting events
    receiver: Receiver<AiEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: AiEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<AiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<AiEvent> {
        self.sender.clone()
    }
}

/// Per-component event buffer with an optional bus tap.
///
/// The local buffer is kept whether or not a tap is attached and only
/// shrinks on [`drain`](Self::drain).
#[derive(Debug)]
pub(crate) struct Outbox<E> {
    pending: Vec<E>,
    tap: Option<Sender<AiEvent>>,
}

impl<E> Default for Outbox<E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            tap: None,
        }
    }
}

impl<E: Clone> Outbox<E> {
    pub(crate) fn attach(&mut self, sender: Sender<AiEvent>) {
        self.tap = Some(sender);
    }

    pub(crate) fn push(&mut self, event: E, wrap: impl FnOnce(E) -> AiEvent) {
        if let Some(tap) = &self.tap {
            let _ = tap.try_send(wrap(event.clone()));
        }
        self.pending.push(event);
    }

    pub(crate) fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn pending(&self) -> &[E] {
        &self.pending
    }
}
