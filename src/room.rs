//! A two-player match context: host and guest seats plus the game state.

use crate::error::GameError;
use crate::game::{Color, GameState, GameStatus, Move};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Stable player identity, unique within a room.
pub type PlayerId = String;

/// Short unique room token.
pub type RoomId = String;

/// A seated player.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Stable user id.
    pub user_id: PlayerId,
    /// Display name.
    pub username: String,
    /// Assigned stone color; set when seated.
    pub color: Option<Color>,
    /// Readiness flag.
    pub is_ready: bool,
    /// Liveness flag.
    pub is_online: bool,
}

impl Player {
    /// Creates a seated, online player with the given color.
    pub fn new(user_id: impl Into<PlayerId>, username: impl Into<String>, color: Color) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            color: Some(color),
            is_ready: true,
            is_online: true,
        }
    }

    /// Creates an online player with no seat color yet; the room assigns
    /// one when the player is seated.
    pub fn unseated(user_id: impl Into<PlayerId>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            color: None,
            is_ready: true,
            is_online: true,
        }
    }
}

/// One room: host seat, optional guest seat, and the owned game state.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// The host; always present while the room exists. Plays Black.
    pub host: Player,
    /// The guest seat. Plays White once filled.
    pub guest: Option<Player>,
    /// The game this room owns.
    pub game: GameState,
    /// Connected viewers beyond the two seats.
    pub spectator_count: u32,
    /// Set during deletion so in-flight commands holding a stale handle
    /// observe NotFound rather than a half-deleted room.
    pub closed: bool,
}

impl Room {
    /// Creates a Waiting room with the host seated as Black.
    #[instrument(skip(host), fields(room_id = %id, host = %host.user_id))]
    pub fn new(id: RoomId, host: Player) -> Self {
        info!(room_id = %id, host = %host.username, "creating room");
        let game = GameState::new(id.clone());
        Self {
            id,
            host,
            guest: None,
            game,
            spectator_count: 0,
            closed: false,
        }
    }

    /// Seats a guest as White and moves the game to Ready. Returns the
    /// seated player so the caller can announce the join without re-reading
    /// the seat later, outside the lock that admitted it.
    #[instrument(skip(self, guest), fields(room_id = %self.id, guest = %guest.user_id))]
    pub fn seat_guest(&mut self, mut guest: Player) -> Result<&Player, GameError> {
        if self.guest.is_some() {
            warn!(room_id = %self.id, "guest seat already taken");
            return Err(GameError::RoomFull {
                room_id: self.id.clone(),
            });
        }
        guest.color = Some(Color::White);
        info!(room_id = %self.id, guest = %guest.username, "guest seated");
        self.game.seat_filled();
        Ok(self.guest.insert(guest))
    }

    /// Vacates the guest seat and regresses the game to Waiting.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn vacate_guest(&mut self) -> Option<Player> {
        let guest = self.guest.take()?;
        info!(room_id = %self.id, guest = %guest.username, "guest left");
        self.game.seat_vacated();
        Some(guest)
    }

    /// True iff the given player holds the host seat.
    pub fn is_host(&self, player_id: &str) -> bool {
        self.host.user_id == player_id
    }

    /// True iff both seats are filled.
    pub fn has_guest(&self) -> bool {
        self.guest.is_some()
    }

    /// Resolves a seated player's assigned color.
    pub fn player_color(&self, player_id: &str) -> Option<Color> {
        if self.host.user_id == player_id {
            self.host.color
        } else if let Some(guest) = &self.guest {
            if guest.user_id == player_id {
                guest.color
            } else {
                None
            }
        } else {
            None
        }
    }

    /// Captures an owned snapshot for the `room_state` event and the
    /// room-info lookup. Subscribers never observe later mutations.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            host: self.host.clone(),
            guest: self.guest.clone(),
            game_state: GameStateView {
                status: self.game.status,
                board: self.game.board.rows(),
                current_player: self.game.current_player,
                winner: self.game.winner,
                last_move: self.game.last_move,
                moves_count: self.game.moves.len(),
                created_at: self.game.created_at,
                updated_at: self.game.updated_at,
            },
            spectator_count: self.spectator_count,
        }
    }
}

/// Owned, serializable view of a room at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    /// Room id.
    pub room_id: RoomId,
    /// The host.
    pub host: Player,
    /// The guest, if seated.
    pub guest: Option<Player>,
    /// The game state view.
    pub game_state: GameStateView,
    /// Connected spectators.
    pub spectator_count: u32,
}

/// Serializable game-state portion of a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateView {
    /// Lifecycle status.
    pub status: GameStatus,
    /// Board as rows of wire-encoded cells.
    pub board: Vec<Vec<u8>>,
    /// Color to move.
    pub current_player: Color,
    /// Winner, if the game finished.
    pub winner: Option<Color>,
    /// The most recent move.
    pub last_move: Option<Move>,
    /// Length of the move log.
    pub moves_count: usize,
    /// Game creation time.
    pub created_at: DateTime<Utc>,
    /// Last state change time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Player {
        Player::new("u1", "alice", Color::Black)
    }

    fn guest() -> Player {
        Player::new("u2", "bob", Color::White)
    }

    #[test]
    fn test_new_room_is_waiting() {
        let room = Room::new("r1".into(), host());
        assert_eq!(room.game.status, GameStatus::Waiting);
        assert!(!room.has_guest());
        assert!(room.is_host("u1"));
        assert!(!room.is_host("u2"));
    }

    #[test]
    fn test_seat_guest_assigns_white_and_readies() {
        let mut room = Room::new("r1".into(), host());
        // The joining player's color is assigned by the room, whatever
        // the caller passed in.
        let mut joiner = guest();
        joiner.color = None;
        let seated = room.seat_guest(joiner).unwrap();
        assert_eq!(seated.color, Some(Color::White));
        assert_eq!(room.game.status, GameStatus::Ready);
        assert_eq!(room.player_color("u2"), Some(Color::White));
    }

    #[test]
    fn test_second_guest_rejected() {
        let mut room = Room::new("r1".into(), host());
        room.seat_guest(guest()).unwrap();
        let third = Player::new("u3", "carol", Color::White);
        assert!(matches!(
            room.seat_guest(third),
            Err(GameError::RoomFull { .. })
        ));
    }

    #[test]
    fn test_vacate_guest_regresses_to_waiting() {
        let mut room = Room::new("r1".into(), host());
        room.seat_guest(guest()).unwrap();
        let left = room.vacate_guest().unwrap();
        assert_eq!(left.user_id, "u2");
        assert_eq!(room.game.status, GameStatus::Waiting);
        assert!(room.vacate_guest().is_none());
    }

    #[test]
    fn test_player_color_lookup() {
        let mut room = Room::new("r1".into(), host());
        assert_eq!(room.player_color("u1"), Some(Color::Black));
        assert_eq!(room.player_color("u2"), None);
        room.seat_guest(guest()).unwrap();
        assert_eq!(room.player_color("u2"), Some(Color::White));
        assert_eq!(room.player_color("stranger"), None);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut room = Room::new("r1".into(), host());
        room.seat_guest(guest()).unwrap();
        let snap = room.snapshot();
        room.game.seat_vacated();
        assert_eq!(snap.game_state.status, GameStatus::Ready);
        assert_eq!(snap.game_state.board.len(), 15);
    }
}
