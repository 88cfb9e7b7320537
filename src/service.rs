//! Command facade over the registry, the game state machine, and the
//! per-room event bus.
//!
//! Every command takes the registry lock briefly to resolve a room handle,
//! then the room's own lock for the mutation. Game events are published
//! here while that lock is still held; membership events are published by
//! the registry inside the same critical section as the seat change. Either
//! way, subscribers observe events in exactly the order the writer lock
//! admitted the transitions. Publishing itself never blocks (the bus drops
//! stalled subscribers).

use crate::error::GameError;
use crate::events::{GameEvent, SubscriberHandle, Subscription};
use crate::game::MoveOutcome;
use crate::registry::{LeaveOutcome, RoomHandle, RoomRegistry};
use crate::room::{Player, Room, RoomId, RoomSnapshot};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delay before a freshly filled room is promoted to Playing on its own.
/// Gives clients a beat to attach their event streams first.
const AUTO_START_DELAY: Duration = Duration::from_millis(500);

/// The room/session manager: all room commands enter here.
#[derive(Debug, Default)]
pub struct GameService {
    registry: RoomRegistry,
}

impl GameService {
    /// Creates a service with an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: RoomRegistry::new(),
        })
    }

    /// Creates a room hosted by the given identity. The host plays Black.
    #[instrument(skip(self))]
    pub fn create_room(&self, user_id: &str, username: &str) -> Result<RoomId, GameError> {
        let host = Player::new(user_id, username, crate::game::Color::Black);
        let handle = self.registry.create_room(host)?;
        info!(room_id = %handle.id, username, "room created");
        Ok(handle.id.clone())
    }

    /// Seats the identity as guest and schedules the deferred auto-start
    /// check. The join announcement is published by the registry under the
    /// same lock that admits the seat change.
    #[instrument(skip(self))]
    pub fn join_room(&self, room_id: &str, user_id: &str, username: &str) -> Result<(), GameError> {
        let handle = self
            .registry
            .join_room(room_id, Player::unseated(user_id, username))?;

        // Deferred promotion, cancellable on room deletion. Not a sleep in
        // the caller's path.
        let deferred = Arc::clone(&handle);
        let task = tokio::spawn(async move {
            tokio::time::sleep(AUTO_START_DELAY).await;
            auto_start(&deferred);
        });
        handle.set_autostart(task.abort_handle());

        info!(room_id, user_id, "player joined, auto-start scheduled");
        Ok(())
    }

    /// Explicit host start: Ready -> Playing.
    #[instrument(skip(self))]
    pub fn start_game(&self, room_id: &str, user_id: &str) -> Result<(), GameError> {
        let handle = self.resolve(room_id)?;
        let mut room = lock_open(&handle)?;
        if !room.is_host(user_id) {
            return Err(GameError::NotHost { action: "start" });
        }
        if !room.has_guest() {
            return Err(GameError::GuestMissing);
        }
        room.game.begin()?;
        handle.cancel_autostart();
        info!(room_id, "game started by host");
        publish_started(&handle, &room);
        Ok(())
    }

    /// Host-only restart: resets the board and returns the room to Ready,
    /// keeping both players seated. Re-emits the start event kind.
    #[instrument(skip(self))]
    pub fn restart_game(&self, room_id: &str, user_id: &str) -> Result<(), GameError> {
        let handle = self.resolve(room_id)?;
        let mut room = lock_open(&handle)?;
        if !room.is_host(user_id) {
            return Err(GameError::NotHost { action: "restart" });
        }
        if !room.has_guest() {
            return Err(GameError::GuestMissing);
        }
        room.game.reset();
        info!(room_id, "game restarted");
        publish_started(&handle, &room);
        Ok(())
    }

    /// Places a stone for the given player. Atomic: any precondition
    /// failure leaves the room untouched and emits nothing.
    #[instrument(skip(self))]
    pub fn make_move(
        &self,
        room_id: &str,
        user_id: &str,
        x: i64,
        y: i64,
    ) -> Result<(), GameError> {
        let handle = self.resolve(room_id)?;
        let mut room = lock_open(&handle)?;
        let color = room
            .player_color(user_id)
            .ok_or_else(|| GameError::PlayerNotInRoom {
                player_id: user_id.to_string(),
            })?;

        let outcome = room.game.apply_move(x, y, color)?;
        let mv = room.game.last_move.expect("move just applied");

        // Exactly one event per successful move.
        match outcome {
            MoveOutcome::Won { winner } => {
                info!(room_id, x, y, winner = %winner, "game ended");
                handle.bus.publish(&GameEvent::GameEnded {
                    room_id: room.id.clone(),
                    winner,
                    mv,
                    timestamp: Utc::now(),
                });
            }
            MoveOutcome::Continue { next } => {
                debug!(room_id, x, y, next = %next, "move made");
                handle.bus.publish(&GameEvent::MoveMade {
                    room_id: room.id.clone(),
                    mv,
                    current_player: next,
                    board: room.game.board.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
        Ok(())
    }

    /// Removes the player from their room. Host departure deletes the room
    /// and evicts the guest; remaining subscribers receive the departure
    /// records and their streams end as the room's channels close.
    #[instrument(skip(self))]
    pub fn leave_room(&self, user_id: &str) -> Result<(), GameError> {
        match self.registry.leave_room(user_id)? {
            LeaveOutcome::HostLeft { room_id, .. } => {
                info!(room_id = %room_id, "room deleted after host left");
            }
            LeaveOutcome::GuestLeft { room_id } => {
                debug!(room_id = %room_id, user_id, "guest left, room stays open");
            }
        }
        Ok(())
    }

    /// Snapshot lookup. Pure; absent for unknown or deleted rooms.
    pub fn get_room_info(&self, room_id: &str) -> Option<RoomSnapshot> {
        let handle = self.registry.get(room_id)?;
        let room = handle.state();
        if room.closed {
            return None;
        }
        Some(room.snapshot())
    }

    /// Room occupied by the player, if any. Pure.
    pub fn get_player_room(&self, player_id: &str) -> Option<RoomId> {
        self.registry.room_of(player_id)
    }

    /// Opens a delivery channel on the room's bus and seeds it with one
    /// `room_state` snapshot so a fresh subscriber can catch up.
    #[instrument(skip(self))]
    pub fn subscribe(&self, room_id: &str) -> Result<Subscription, GameError> {
        let handle = self.resolve(room_id)?;
        let room = lock_open(&handle)?;
        let subscription = handle.bus.subscribe();
        handle.bus.send_to(
            subscription.handle,
            GameEvent::RoomState {
                room_id: room.id.clone(),
                room: room.snapshot(),
                timestamp: Utc::now(),
            },
        );
        debug!(room_id, subscribers = handle.bus.subscriber_count(), "subscriber attached");
        Ok(subscription)
    }

    /// Detaches a subscriber. Idempotent; a no-op once the room is gone.
    pub fn unsubscribe(&self, room_id: &str, handle: SubscriberHandle) {
        if let Some(room) = self.registry.get(room_id) {
            room.bus.unsubscribe(handle);
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, room_id: &str) -> usize {
        self.registry
            .get(room_id)
            .map(|handle| handle.bus.subscriber_count())
            .unwrap_or(0)
    }

    fn resolve(&self, room_id: &str) -> Result<Arc<RoomHandle>, GameError> {
        self.registry.get(room_id).ok_or_else(|| {
            warn!(room_id, "room not found");
            GameError::RoomNotFound {
                room_id: room_id.to_string(),
            }
        })
    }
}

/// Locks the room, translating a closed (mid-deletion) room into NotFound
/// so callers holding a stale handle see the same thing as a missing room.
fn lock_open(handle: &Arc<RoomHandle>) -> Result<std::sync::MutexGuard<'_, Room>, GameError> {
    let room = handle.state();
    if room.closed {
        return Err(GameError::RoomNotFound {
            room_id: handle.id.clone(),
        });
    }
    Ok(room)
}

/// Deferred Ready -> Playing promotion, run once the debounce elapses.
/// No-op unless both players are still present and the game is still
/// Ready, so an explicit start racing this check cannot double-fire
/// `game_started`. Deletion aborts the task and also sets `closed`.
fn auto_start(handle: &RoomHandle) {
    let mut room = handle.state();
    if room.closed || !room.has_guest() {
        return;
    }
    if room.game.begin().is_err() {
        debug!(room_id = %handle.id, "auto-start found game already promoted");
        return;
    }
    info!(room_id = %handle.id, "game auto-started");
    publish_started(handle, &room);
}

fn publish_started(handle: &RoomHandle, room: &Room) {
    handle.bus.publish(&GameEvent::GameStarted {
        room_id: room.id.clone(),
        current_player: room.game.current_player,
        host_color: room.host.color,
        guest_color: room.guest.as_ref().and_then(|g| g.color),
        timestamp: Utc::now(),
    });
}
