//! Gomoku game engine: board, rules, and per-room state machine.

mod board;
mod rules;
mod state;
mod types;

pub use board::{BOARD_SIZE, Board};
pub use rules::{check_win, in_bounds};
pub use state::{GameState, MoveOutcome};
pub use types::{Cell, Color, GameStatus, Move};
