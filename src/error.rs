//! Domain error taxonomy for room and game commands.
//!
//! Every rejected command maps to one of three caller-facing categories:
//! precondition failures, missing resources, and conflicts. Transport
//! failures (a subscriber whose channel closed) are recovered locally by
//! the event bus and never surface here.

use crate::game::{Color, GameStatus};
use derive_more::{Display, Error};

/// Broad category of a rejected command, used for HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command was well-addressed but illegal in the current state.
    PreconditionFailed,
    /// The addressed room or player does not exist.
    NotFound,
    /// The command collides with existing state (seat taken, already in a room).
    Conflict,
}

/// A rejected room or game command. No variant implies any state change.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameError {
    /// The room does not exist (or vanished mid-interaction).
    #[display("room {room_id} not found")]
    RoomNotFound {
        /// The room id that failed to resolve.
        room_id: String,
    },

    /// The player has no current room mapping.
    #[display("player {player_id} is not in a room")]
    PlayerNotInRoom {
        /// The player id that failed to resolve.
        player_id: String,
    },

    /// The player already occupies a room; one active room per player.
    #[display("player {player_id} is already in room {room_id}")]
    AlreadyInRoom {
        /// The offending player.
        player_id: String,
        /// The room they already occupy.
        room_id: String,
    },

    /// The guest seat is already taken.
    #[display("room {room_id} is full")]
    RoomFull {
        /// The full room.
        room_id: String,
    },

    /// A host-only command issued by a non-host.
    #[display("only the host may {action} the game")]
    NotHost {
        /// The attempted command, for the user-facing message.
        action: &'static str,
    },

    /// The command is not legal in the game's current status.
    #[display("command not allowed while the game is {status}")]
    WrongStatus {
        /// Status at the time of the command.
        status: GameStatus,
    },

    /// No guest has joined yet.
    #[display("the guest seat is empty")]
    GuestMissing,

    /// Coordinates fall off the 15x15 board.
    #[display("coordinates ({x}, {y}) are out of bounds")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
    },

    /// The target cell already holds a stone.
    #[display("cell ({x}, {y}) is already occupied")]
    CellOccupied {
        /// Requested column.
        x: usize,
        /// Requested row.
        y: usize,
    },

    /// The mover's color does not match the current turn.
    #[display("not your turn; waiting for {current}")]
    NotYourTurn {
        /// The color whose turn it is.
        current: Color,
    },
}

impl GameError {
    /// Classifies the error for propagation policy and HTTP mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::RoomNotFound { .. } | GameError::PlayerNotInRoom { .. } => {
                ErrorKind::NotFound
            }
            GameError::AlreadyInRoom { .. } | GameError::RoomFull { .. } => ErrorKind::Conflict,
            GameError::NotHost { .. }
            | GameError::WrongStatus { .. }
            | GameError::GuestMissing
            | GameError::OutOfBounds { .. }
            | GameError::CellOccupied { .. }
            | GameError::NotYourTurn { .. } => ErrorKind::PreconditionFailed,
        }
    }
}
