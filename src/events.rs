//! Event records and the per-room fan-out bus.
//!
//! Events form a closed, type-tagged set so the transport boundary can
//! match exhaustively. The bus fans each published event out to every live
//! subscriber of a room over a bounded channel; delivery is best-effort and
//! never blocks the publisher. A subscriber whose channel is full or closed
//! is dropped from the list, and delivery to the rest proceeds.

use crate::game::{Board, Color, Move};
use crate::room::{Player, PlayerId, RoomId, RoomSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffered events per subscriber before it is considered stalled.
const SUBSCRIBER_BUFFER: usize = 64;

/// A game or lifecycle event delivered to room subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A guest joined the room.
    PlayerJoined {
        /// Room the event belongs to.
        room_id: RoomId,
        /// The player who joined.
        player: Player,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A player left the room.
    PlayerLeft {
        /// Room the event belongs to.
        room_id: RoomId,
        /// Who left.
        player_id: PlayerId,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// The game started (also emitted on restart).
    GameStarted {
        /// Room the event belongs to.
        room_id: RoomId,
        /// Color to move first.
        current_player: Color,
        /// The host's color.
        host_color: Option<Color>,
        /// The guest's color.
        guest_color: Option<Color>,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A stone was placed and the game continues.
    MoveMade {
        /// Room the event belongs to.
        room_id: RoomId,
        /// The accepted move.
        #[serde(rename = "move")]
        mv: Move,
        /// Color now to move.
        current_player: Color,
        /// Full board after the move.
        board: Board,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// The game ended with a winner.
    GameEnded {
        /// Room the event belongs to.
        room_id: RoomId,
        /// The winning color.
        winner: Color,
        /// The winning move.
        #[serde(rename = "move")]
        mv: Move,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Full room snapshot, sent once to each fresh subscriber.
    RoomState {
        /// Room the event belongs to.
        room_id: RoomId,
        /// The snapshot.
        room: RoomSnapshot,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// Periodic liveness record when no game event has been delivered.
    Heartbeat {
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
    /// A transport-level error surfaced to the subscriber.
    Error {
        /// Human-readable reason.
        message: String,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
}

/// Opaque handle identifying one subscriber on a room's bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

/// A live subscription: the handle for later removal plus the receiving
/// end of the delivery channel.
#[derive(Debug)]
pub struct Subscription {
    /// Handle used to unsubscribe.
    pub handle: SubscriberHandle,
    /// Ordered event stream for this subscriber.
    pub receiver: mpsc::Receiver<GameEvent>,
}

struct SubscriberSlot {
    handle: SubscriberHandle,
    sender: mpsc::Sender<GameEvent>,
}

/// Fan-out of one room's events to its live subscribers.
#[derive(Default)]
pub struct EventBus {
    slots: Mutex<Vec<SubscriberSlot>>,
    next_handle: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new delivery channel. No replay: the caller is expected
    /// to push a `room_state` snapshot into the fresh channel to catch up.
    pub fn subscribe(&self) -> Subscription {
        let handle = SubscriberHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.slots
            .lock()
            .expect("event bus lock poisoned")
            .push(SubscriberSlot { handle, sender });
        debug!(handle = handle.0, "subscriber registered");
        Subscription { handle, receiver }
    }

    /// Removes a subscriber. Idempotent: unknown handles are ignored, so a
    /// disconnect racing a lazy drop-on-failure cannot double-unregister.
    pub fn unsubscribe(&self, handle: SubscriberHandle) {
        let mut slots = self.slots.lock().expect("event bus lock poisoned");
        slots.retain(|slot| slot.handle != handle);
    }

    /// Delivers an event to every live subscriber without blocking.
    ///
    /// A subscriber whose channel is full or closed is dropped; the rest
    /// still receive the event, in emission order.
    pub fn publish(&self, event: &GameEvent) {
        let mut slots = self.slots.lock().expect("event bus lock poisoned");
        slots.retain(|slot| match slot.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(handle = slot.handle.0, error = %err, "dropping subscriber");
                false
            }
        });
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().expect("event bus lock poisoned").len()
    }

    /// Pushes an event into one specific subscriber's channel, used for the
    /// initial `room_state` snapshot.
    pub fn send_to(&self, handle: SubscriberHandle, event: GameEvent) {
        let slots = self.slots.lock().expect("event bus lock poisoned");
        if let Some(slot) = slots.iter().find(|slot| slot.handle == handle)
            && let Err(err) = slot.sender.try_send(event)
        {
            warn!(handle = handle.0, error = %err, "failed to seed subscriber");
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
