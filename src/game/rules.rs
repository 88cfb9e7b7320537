//! Placement validity and five-in-a-row detection.

use super::board::{BOARD_SIZE, Board};
use super::types::{Cell, Color};

/// Checks whether the coordinates fall on the board.
pub fn in_bounds(x: i64, y: i64) -> bool {
    (0..BOARD_SIZE as i64).contains(&x) && (0..BOARD_SIZE as i64).contains(&y)
}

/// Checks whether the stone just placed at `(x, y)` completes five or more
/// contiguous same-color stones in any of the four line orientations.
///
/// Pure: scans at most 4 cells out from the placed stone in each direction,
/// exiting early on a mismatch or the board edge.
pub fn check_win(board: &Board, x: usize, y: usize, color: Color) -> bool {
    // (dx, dy): horizontal, vertical, diagonal down-right, diagonal up-right.
    const DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

    for (dx, dy) in DIRECTIONS {
        let mut count = 1;
        count += run_length(board, x, y, dx, dy, color);
        count += run_length(board, x, y, -dx, -dy, color);
        if count >= 5 {
            return true;
        }
    }

    false
}

/// Counts contiguous `color` stones out from `(x, y)` along `(dx, dy)`,
/// excluding the origin cell itself.
fn run_length(board: &Board, x: usize, y: usize, dx: i64, dy: i64, color: Color) -> usize {
    let mut count = 0;
    for step in 1..=4i64 {
        let nx = x as i64 + dx * step;
        let ny = y as i64 + dy * step;
        if !in_bounds(nx, ny) {
            break;
        }
        if board.get(nx as usize, ny as usize) != Some(Cell::Stone(color)) {
            break;
        }
        count += 1;
    }
    count
}
