//! The room registry: room-id and player-id maps plus per-room handles.
//!
//! Locking discipline: the registry's two maps share one mutex scoped to
//! structural changes (create, delete, seat mappings); each room's state
//! sits behind its own mutex so unrelated rooms never contend. Lock order
//! is always registry first, then room, and no lock is held across an
//! `.await`. Deletion holds both scopes and flips the room's `closed` flag,
//! so a command that cloned the handle earlier observes NotFound instead of
//! a half-deleted room.
//!
//! Membership events (`player_joined`, `player_left`) are published here,
//! inside the same room-lock critical section as the seat change itself,
//! so no concurrently admitted command can slip its event in between.

use crate::error::GameError;
use crate::events::{EventBus, GameEvent};
use crate::room::{Player, PlayerId, Room, RoomId};
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

/// Length of generated room ids.
const ROOM_ID_LEN: usize = 8;

/// Shared handle to one room: its state lock, its event bus, and the
/// deferred auto-start task, if one is pending.
pub struct RoomHandle {
    /// Room id.
    pub id: RoomId,
    state: Mutex<Room>,
    /// Fan-out bus for this room's subscribers.
    pub bus: EventBus,
    autostart: Mutex<Option<AbortHandle>>,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            id: room.id.clone(),
            state: Mutex::new(room),
            bus: EventBus::new(),
            autostart: Mutex::new(None),
        }
    }

    /// Locks the room state. This is the single-writer-per-room gate: all
    /// mutation of this room's game and seats happens under this guard.
    pub fn state(&self) -> MutexGuard<'_, Room> {
        self.state.lock().expect("room state lock poisoned")
    }

    /// Records the pending auto-start task, aborting any previous one.
    pub fn set_autostart(&self, handle: AbortHandle) {
        let mut slot = self.autostart.lock().expect("autostart lock poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Cancels the pending auto-start task, if any.
    pub fn cancel_autostart(&self) {
        let mut slot = self.autostart.lock().expect("autostart lock poisoned");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle").field("id", &self.id).finish()
    }
}

/// Result of a leave operation. The departure events have already been
/// published by the time this is returned.
#[derive(Debug)]
pub enum LeaveOutcome {
    /// The host left; the room was deleted and all mappings removed.
    HostLeft {
        /// The deleted room.
        room_id: RoomId,
        /// The evicted guest's id, if a guest was seated.
        guest_id: Option<PlayerId>,
    },
    /// A guest left; the room regressed to Waiting.
    GuestLeft {
        /// The room the guest left.
        room_id: RoomId,
    },
}

#[derive(Debug, Default)]
struct RegistryInner {
    rooms: HashMap<RoomId, Arc<RoomHandle>>,
    player_rooms: HashMap<PlayerId, RoomId>,
}

/// Owns the room and player maps; all mutation routes through here.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with the given host and installs both mappings.
    ///
    /// Fails with Conflict if the host already occupies a room.
    #[instrument(skip(self, host), fields(host = %host.user_id))]
    pub fn create_room(&self, host: Player) -> Result<Arc<RoomHandle>, GameError> {
        let mut inner = self.lock_inner();
        if let Some(existing) = inner.player_rooms.get(&host.user_id) {
            warn!(player_id = %host.user_id, room_id = %existing, "player already in a room");
            return Err(GameError::AlreadyInRoom {
                player_id: host.user_id.clone(),
                room_id: existing.clone(),
            });
        }

        let room_id = generate_room_id(&inner.rooms);
        let host_id = host.user_id.clone();
        let handle = Arc::new(RoomHandle::new(Room::new(room_id.clone(), host)));
        inner.rooms.insert(room_id.clone(), Arc::clone(&handle));
        inner.player_rooms.insert(host_id, room_id.clone());
        info!(room_id = %room_id, "room created");
        Ok(handle)
    }

    /// Seats a player in the room's guest slot and records the mapping.
    ///
    /// The seat assignment, the mapping insert, and the `player_joined`
    /// announcement all happen under both the registry and room locks, so
    /// the three can never disagree and the event lands in transition order.
    #[instrument(skip(self, player), fields(player_id = %player.user_id))]
    pub fn join_room(&self, room_id: &str, player: Player) -> Result<Arc<RoomHandle>, GameError> {
        let mut inner = self.lock_inner();
        if let Some(existing) = inner.player_rooms.get(&player.user_id) {
            return Err(GameError::AlreadyInRoom {
                player_id: player.user_id.clone(),
                room_id: existing.clone(),
            });
        }
        let handle = inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| GameError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;

        let player_id = player.user_id.clone();
        {
            let mut room = handle.state();
            let guest = room.seat_guest(player)?.clone();
            inner.player_rooms.insert(player_id, room_id.to_string());
            handle.bus.publish(&GameEvent::PlayerJoined {
                room_id: room.id.clone(),
                player: guest,
                timestamp: Utc::now(),
            });
        }
        Ok(handle)
    }

    /// Removes a player from their room.
    ///
    /// Host departure deletes the room: both mappings go, the pending
    /// auto-start is aborted, and the room is marked closed while both
    /// locks are held. Guest departure only vacates the seat and drops
    /// that player's mapping. The `player_left` records go out before the
    /// room lock drops, so they are ordered against every other transition
    /// and, for a deleted room, are the room's final events.
    #[instrument(skip(self))]
    pub fn leave_room(&self, player_id: &str) -> Result<LeaveOutcome, GameError> {
        let mut inner = self.lock_inner();
        let room_id = inner
            .player_rooms
            .get(player_id)
            .cloned()
            .ok_or_else(|| GameError::PlayerNotInRoom {
                player_id: player_id.to_string(),
            })?;
        let handle = inner
            .rooms
            .get(&room_id)
            .cloned()
            .expect("registry desync: mapped player points at a missing room");

        let mut room = handle.state();
        if room.is_host(player_id) {
            room.closed = true;
            let guest_id = room.guest.as_ref().map(|g| g.user_id.clone());
            inner.rooms.remove(&room_id);
            inner.player_rooms.remove(player_id);
            if let Some(guest_id) = &guest_id {
                inner.player_rooms.remove(guest_id);
            }
            handle.cancel_autostart();
            handle.bus.publish(&GameEvent::PlayerLeft {
                room_id: room.id.clone(),
                player_id: player_id.to_string(),
                timestamp: Utc::now(),
            });
            if let Some(guest_id) = &guest_id {
                handle.bus.publish(&GameEvent::PlayerLeft {
                    room_id: room.id.clone(),
                    player_id: guest_id.clone(),
                    timestamp: Utc::now(),
                });
            }
            drop(room);
            info!(room_id = %room_id, "host left, room deleted");
            Ok(LeaveOutcome::HostLeft { room_id, guest_id })
        } else {
            room.vacate_guest();
            inner.player_rooms.remove(player_id);
            handle.bus.publish(&GameEvent::PlayerLeft {
                room_id: room.id.clone(),
                player_id: player_id.to_string(),
                timestamp: Utc::now(),
            });
            drop(room);
            debug!(room_id = %room_id, player_id, "guest mapping removed");
            Ok(LeaveOutcome::GuestLeft { room_id })
        }
    }

    /// Looks up a room handle. Pure.
    pub fn get(&self, room_id: &str) -> Option<Arc<RoomHandle>> {
        self.lock_inner().rooms.get(room_id).cloned()
    }

    /// Looks up the room a player currently occupies. Pure.
    pub fn room_of(&self, player_id: &str) -> Option<RoomId> {
        self.lock_inner().player_rooms.get(player_id).cloned()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.lock_inner().rooms.len()
    }

    fn lock_inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().expect("registry lock poisoned")
    }
}

/// Generates a short room id unique among live rooms.
fn generate_room_id(existing: &HashMap<RoomId, Arc<RoomHandle>>) -> RoomId {
    loop {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ROOM_ID_LEN)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        if !existing.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Color, GameStatus};

    fn player(id: &str, name: &str) -> Player {
        Player::new(id, name, Color::Black)
    }

    #[test]
    fn test_create_room_installs_mappings() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        assert_eq!(handle.id.len(), ROOM_ID_LEN);
        assert_eq!(registry.room_of("u1"), Some(handle.id.clone()));
        assert!(registry.get(&handle.id).is_some());
    }

    #[test]
    fn test_one_room_per_player() {
        let registry = RoomRegistry::new();
        registry.create_room(player("u1", "alice")).unwrap();
        assert!(matches!(
            registry.create_room(player("u1", "alice")),
            Err(GameError::AlreadyInRoom { .. })
        ));

        let other = registry.create_room(player("u2", "bob")).unwrap();
        assert!(matches!(
            registry.join_room(&other.id, player("u1", "alice")),
            Err(GameError::AlreadyInRoom { .. })
        ));
    }

    #[test]
    fn test_join_unknown_room() {
        let registry = RoomRegistry::new();
        assert!(matches!(
            registry.join_room("nope", player("u1", "alice")),
            Err(GameError::RoomNotFound { .. })
        ));
    }

    #[test]
    fn test_join_full_room_leaves_no_mapping() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        registry.join_room(&handle.id, player("u2", "bob")).unwrap();

        assert!(matches!(
            registry.join_room(&handle.id, player("u3", "carol")),
            Err(GameError::RoomFull { .. })
        ));
        assert_eq!(registry.room_of("u3"), None);
    }

    #[test]
    fn test_host_leave_cascades() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        let room_id = handle.id.clone();
        registry.join_room(&room_id, player("u2", "bob")).unwrap();

        match registry.leave_room("u1").unwrap() {
            LeaveOutcome::HostLeft { guest_id, .. } => {
                assert_eq!(guest_id.as_deref(), Some("u2"));
                assert!(handle.state().closed);
            }
            other => panic!("expected HostLeft, got {other:?}"),
        }
        // Both mappings and the room entry are gone.
        assert_eq!(registry.get(&room_id).map(|h| h.id.clone()), None);
        assert_eq!(registry.room_of("u1"), None);
        assert_eq!(registry.room_of("u2"), None);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_guest_leave_only_vacates_seat() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        let room_id = handle.id.clone();
        registry.join_room(&room_id, player("u2", "bob")).unwrap();

        match registry.leave_room("u2").unwrap() {
            LeaveOutcome::GuestLeft { room_id: left } => assert_eq!(left, room_id),
            other => panic!("expected GuestLeft, got {other:?}"),
        }
        {
            let room = handle.state();
            assert!(!room.has_guest());
            assert_eq!(room.game.status, GameStatus::Waiting);
        }
        assert!(registry.get(&room_id).is_some());
        assert_eq!(registry.room_of("u1"), Some(room_id));
        assert_eq!(registry.room_of("u2"), None);
    }

    #[test]
    fn test_leave_without_room() {
        let registry = RoomRegistry::new();
        assert!(matches!(
            registry.leave_room("ghost"),
            Err(GameError::PlayerNotInRoom { .. })
        ));
    }

    #[test]
    fn test_join_announces_seated_guest() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        let mut sub = handle.bus.subscribe();
        registry.join_room(&handle.id, player("u2", "bob")).unwrap();

        // The announcement carries the seat as assigned under the lock.
        match sub.receiver.try_recv() {
            Ok(GameEvent::PlayerJoined { player, .. }) => {
                assert_eq!(player.user_id, "u2");
                assert_eq!(player.color, Some(Color::White));
            }
            other => panic!("expected player_joined, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_join_announces_nothing() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        registry.join_room(&handle.id, player("u2", "bob")).unwrap();
        let mut sub = handle.bus.subscribe();

        assert!(registry.join_room(&handle.id, player("u3", "carol")).is_err());
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn test_host_leave_announces_both_departures() {
        let registry = RoomRegistry::new();
        let handle = registry.create_room(player("u1", "alice")).unwrap();
        registry.join_room(&handle.id, player("u2", "bob")).unwrap();
        let mut sub = handle.bus.subscribe();

        registry.leave_room("u1").unwrap();
        let mut left = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            match event {
                GameEvent::PlayerLeft { player_id, .. } => left.push(player_id),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(left, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn test_room_ids_are_distinct() {
        let registry = RoomRegistry::new();
        let a = registry.create_room(player("u1", "alice")).unwrap();
        let b = registry.create_room(player("u2", "bob")).unwrap();
        assert_ne!(a.id, b.id);
    }
}
