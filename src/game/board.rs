//! The 15x15 Gomoku board.

use super::types::{Cell, Color};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Side length of the board.
pub const BOARD_SIZE: usize = 15;

/// Fixed 15x15 grid of cells, indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Gets the cell at the given coordinates, or `None` if out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Checks if the cell at the given coordinates is empty.
    ///
    /// Out-of-bounds coordinates are not empty.
    pub fn is_empty(&self, x: usize, y: usize) -> bool {
        matches!(self.get(x, y), Some(Cell::Empty))
    }

    /// Places a stone. The caller guarantees the coordinates are in bounds
    /// and the cell is empty; this is not re-validated here.
    pub fn place(&mut self, x: usize, y: usize, color: Color) {
        debug_assert!(self.is_empty(x, y));
        self.cells[y][x] = Cell::Stone(color);
    }

    /// Counts the stones on the board.
    pub fn stone_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| **c != Cell::Empty)
            .count()
    }

    /// Returns the board as rows of wire-encoded cells (0/1/2).
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.as_u8()).collect())
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

// The wire format is the original nested-row encoding, not a struct.
impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(BOARD_SIZE))?;
        for row in &self.cells {
            let encoded: Vec<u8> = row.iter().map(|c| c.as_u8()).collect();
            seq.serialize_element(&encoded)?;
        }
        seq.end()
    }
}
