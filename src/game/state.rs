//! The per-room game state machine.
//!
//! Owns transition legality for a single room's game: Waiting -> Ready ->
//! Playing -> Finished, with restart resetting back to Ready. Identity
//! checks (who is host, which color a player holds) live one level up in
//! the room; this machine only sees statuses, colors, and coordinates.

use super::board::Board;
use super::rules;
use super::types::{Color, GameStatus, Move};
use crate::error::GameError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

/// Outcome of a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game continues; the turn has flipped to the given color.
    Continue {
        /// The color now to move.
        next: Color,
    },
    /// The move completed five in a row; the game is finished.
    Won {
        /// The winning color.
        winner: Color,
    },
}

/// Complete state of one room's game.
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    /// Room this game belongs to.
    pub room_id: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// The board.
    pub board: Board,
    /// Color whose turn it is.
    pub current_player: Color,
    /// Winner, set exactly when status is Finished.
    pub winner: Option<Color>,
    /// The most recent move.
    pub last_move: Option<Move>,
    /// Ordered, append-only move log.
    pub moves: Vec<Move>,
    /// When the game state was created.
    pub created_at: DateTime<Utc>,
    /// When the game state last changed.
    pub updated_at: DateTime<Utc>,
}

impl GameState {
    /// Creates a fresh Waiting game for the given room. Black moves first.
    pub fn new(room_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            room_id: room_id.into(),
            status: GameStatus::Waiting,
            board: Board::new(),
            current_player: Color::Black,
            winner: None,
            last_move: None,
            moves: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the room Ready once a guest has been seated.
    pub(crate) fn seat_filled(&mut self) {
        self.status = GameStatus::Ready;
        self.touch();
    }

    /// Regresses to Waiting when the guest seat is vacated.
    pub(crate) fn seat_vacated(&mut self) {
        self.status = GameStatus::Waiting;
        self.touch();
    }

    /// Promotes Ready -> Playing.
    ///
    /// Exactly one promotion can succeed; a second attempt (explicit start
    /// racing the auto-start, or vice versa) sees Playing and is rejected
    /// without re-firing the transition.
    #[instrument(skip(self), fields(room_id = %self.room_id, status = %self.status))]
    pub fn begin(&mut self) -> Result<(), GameError> {
        if self.status != GameStatus::Ready {
            return Err(GameError::WrongStatus {
                status: self.status,
            });
        }
        self.status = GameStatus::Playing;
        self.touch();
        debug!(room_id = %self.room_id, "game promoted to playing");
        Ok(())
    }

    /// Validates and applies one stone placement. All-or-nothing: any
    /// precondition failure leaves the state untouched.
    #[instrument(skip(self), fields(room_id = %self.room_id, x, y, color = %color))]
    pub fn apply_move(&mut self, x: i64, y: i64, color: Color) -> Result<MoveOutcome, GameError> {
        if self.status != GameStatus::Playing {
            return Err(GameError::WrongStatus {
                status: self.status,
            });
        }
        if !rules::in_bounds(x, y) {
            return Err(GameError::OutOfBounds { x, y });
        }
        let (x, y) = (x as usize, y as usize);
        if !self.board.is_empty(x, y) {
            return Err(GameError::CellOccupied { x, y });
        }
        if self.current_player != color {
            return Err(GameError::NotYourTurn {
                current: self.current_player,
            });
        }

        // All preconditions hold; the placement cannot fail from here.
        self.board.place(x, y, color);
        let mv = Move {
            x,
            y,
            color,
            timestamp: Utc::now(),
        };
        self.moves.push(mv);
        self.last_move = Some(mv);
        self.touch();

        if rules::check_win(&self.board, x, y, color) {
            self.status = GameStatus::Finished;
            self.winner = Some(color);
            Ok(MoveOutcome::Won { winner: color })
        } else {
            self.current_player = color.opponent();
            Ok(MoveOutcome::Continue {
                next: self.current_player,
            })
        }
    }

    /// Resets board, log, winner, and turn; status returns to Ready.
    /// The players keep their seats and colors.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn reset(&mut self) {
        self.board = Board::new();
        self.current_player = Color::Black;
        self.winner = None;
        self.last_move = None;
        self.moves.clear();
        self.status = GameStatus::Ready;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_state() -> GameState {
        let mut state = GameState::new("room1");
        state.seat_filled();
        state.begin().unwrap();
        state
    }

    #[test]
    fn test_begin_requires_ready() {
        let mut state = GameState::new("room1");
        assert_eq!(
            state.begin(),
            Err(GameError::WrongStatus {
                status: GameStatus::Waiting
            })
        );

        state.seat_filled();
        assert!(state.begin().is_ok());
        assert_eq!(state.status, GameStatus::Playing);

        // Second promotion is rejected and fires no second transition.
        assert_eq!(
            state.begin(),
            Err(GameError::WrongStatus {
                status: GameStatus::Playing
            })
        );
    }

    #[test]
    fn test_turn_alternates_strictly() {
        let mut state = playing_state();
        assert_eq!(
            state.apply_move(0, 0, Color::Black),
            Ok(MoveOutcome::Continue { next: Color::White })
        );
        assert_eq!(
            state.apply_move(1, 0, Color::White),
            Ok(MoveOutcome::Continue { next: Color::Black })
        );
        // Moving out of turn is rejected without mutating anything.
        let before = state.moves.len();
        assert_eq!(
            state.apply_move(2, 0, Color::White),
            Err(GameError::NotYourTurn {
                current: Color::Black
            })
        );
        assert_eq!(state.moves.len(), before);
    }

    #[test]
    fn test_move_log_matches_board() {
        let mut state = playing_state();
        let moves = [(7, 7), (8, 8), (6, 7), (9, 9), (5, 7)];
        for (i, &(x, y)) in moves.iter().enumerate() {
            let color = if i % 2 == 0 { Color::Black } else { Color::White };
            state.apply_move(x, y, color).unwrap();
            assert_eq!(state.moves.len(), state.board.stone_count());
        }
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let mut state = playing_state();
        state.apply_move(7, 7, Color::Black).unwrap();
        assert_eq!(
            state.apply_move(7, 7, Color::White),
            Err(GameError::CellOccupied { x: 7, y: 7 })
        );
        // Turn did not flip on the rejected move.
        assert_eq!(state.current_player, Color::White);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut state = playing_state();
        assert!(matches!(
            state.apply_move(15, 0, Color::Black),
            Err(GameError::OutOfBounds { .. })
        ));
        assert!(matches!(
            state.apply_move(-1, 3, Color::Black),
            Err(GameError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_winning_move_finishes_without_turn_flip() {
        let mut state = playing_state();
        // Black builds 6..=10 on row 7; White plays elsewhere.
        for i in 0..4 {
            state.apply_move(6 + i, 7, Color::Black).unwrap();
            state.apply_move(6 + i, 8, Color::White).unwrap();
        }
        let outcome = state.apply_move(10, 7, Color::Black).unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Won {
                winner: Color::Black
            }
        );
        assert_eq!(state.status, GameStatus::Finished);
        assert_eq!(state.winner, Some(Color::Black));
        // Turn stays on the winner; no further moves are accepted.
        assert_eq!(state.current_player, Color::Black);
        assert!(matches!(
            state.apply_move(0, 0, Color::White),
            Err(GameError::WrongStatus { .. })
        ));
    }

    #[test]
    fn test_finished_iff_winner_set() {
        let mut state = playing_state();
        assert!(state.winner.is_none());
        for i in 0..4 {
            state.apply_move(6 + i, 7, Color::Black).unwrap();
            state.apply_move(6 + i, 8, Color::White).unwrap();
            assert_eq!(state.status == GameStatus::Finished, state.winner.is_some());
        }
        state.apply_move(10, 7, Color::Black).unwrap();
        assert_eq!(state.status == GameStatus::Finished, state.winner.is_some());
    }

    #[test]
    fn test_reset_preserves_nothing_but_room() {
        let mut state = playing_state();
        for i in 0..4 {
            state.apply_move(6 + i, 7, Color::Black).unwrap();
            state.apply_move(6 + i, 8, Color::White).unwrap();
        }
        state.apply_move(10, 7, Color::Black).unwrap();

        state.reset();
        assert_eq!(state.status, GameStatus::Ready);
        assert_eq!(state.board.stone_count(), 0);
        assert!(state.moves.is_empty());
        assert!(state.winner.is_none());
        assert!(state.last_move.is_none());
        assert_eq!(state.current_player, Color::Black);
    }
}
