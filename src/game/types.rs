//! Core domain types for Gomoku.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stone color. Black moves first; the host is always Black.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Color {
    /// Black stones (goes first).
    Black,
    /// White stones (goes second).
    White,
}

impl Color {
    /// Returns the opposing color.
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// No stone placed.
    Empty,
    /// A stone of the given color.
    Stone(Color),
}

impl Cell {
    /// Wire encoding: 0 empty, 1 black, 2 white.
    pub fn as_u8(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Stone(Color::Black) => 1,
            Cell::Stone(Color::White) => 2,
        }
    }
}

/// Lifecycle status of a room's game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    /// Waiting for a second player.
    Waiting,
    /// Both seats filled, game not started.
    Ready,
    /// Moves are being accepted.
    Playing,
    /// Terminal; a winner is set.
    Finished,
}

/// A recorded stone placement. Append-only once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Column, 0-14.
    pub x: usize,
    /// Row, 0-14.
    pub y: usize,
    /// Color of the placed stone.
    pub color: Color,
    /// When the move was accepted.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_flips() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(Color::White.opponent(), Color::Black);
    }

    #[test]
    fn test_cell_wire_encoding() {
        assert_eq!(Cell::Empty.as_u8(), 0);
        assert_eq!(Cell::Stone(Color::Black).as_u8(), 1);
        assert_eq!(Cell::Stone(Color::White).as_u8(), 2);
    }

    #[test]
    fn test_color_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Color::Black).unwrap(), "\"black\"");
        assert_eq!(
            serde_json::to_string(&GameStatus::Waiting).unwrap(),
            "\"waiting\""
        );
    }
}
