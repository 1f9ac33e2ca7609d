//! Static board evaluation used at the leaves of the expectimax search.
//!
//! Each 16-bit line gets a score from four weighted terms (empty cells, merge
//! potential, monotonicity, tile-sum penalty). The per-line scores are precomputed
//! alongside the move tables; a board is scored along both axes.

use crate::engine::{self, Board};

pub const LOST_PENALTY: f64 = 200_000.0;
pub const MONOTONICITY_POWER: f64 = 4.0;
pub const MONOTONICITY_WEIGHT: f64 = 47.0;
pub const SUM_POWER: f64 = 3.5;
pub const SUM_WEIGHT: f64 = 11.0;
pub const MERGES_WEIGHT: f64 = 700.0;
pub const EMPTY_WEIGHT: f64 = 270.0;

/// Heuristic value of a board: all four rows plus all four columns.
///
/// ```
/// use ai_2048_advisor::engine::Board;
/// use ai_2048_advisor::heuristic::{board_heuristic, LOST_PENALTY};
/// // An empty board is eight empty lines.
/// assert!(board_heuristic(Board::EMPTY) > 8.0 * LOST_PENALTY);
/// ```
#[inline]
pub fn board_heuristic(board: Board) -> f64 {
    engine::heuristic_rows(board.raw()) + engine::heuristic_rows(engine::transpose(board.raw()))
}

/// Heuristic value of a single line given as ranks in reading order.
pub(crate) fn line_heuristic(line: &[u64; 4]) -> f64 {
    let (left, right) = monotonicity(line);
    LOST_PENALTY + calc_empty(line) + calc_merges(line)
        - MONOTONICITY_WEIGHT * left.min(right)
        - calc_sum(line)
}

/// Unweighted monotonicity penalties `(left, right)` of a line.
///
/// `left` accumulates every step where the rank decreases along the line, `right`
/// every step where it does not. A line that only ever decreases has `right == 0`;
/// one that never decreases has `left == 0`. The heuristic charges the smaller one.
pub fn monotonicity(line: &[u64; 4]) -> (f64, f64) {
    let mut monotonicity_left = 0.;
    let mut monotonicity_right = 0.;
    for i in 1..4 {
        let tile1 = line[i - 1] as f64;
        let tile2 = line[i] as f64;
        if tile1 > tile2 {
            monotonicity_left += tile1.powf(MONOTONICITY_POWER) - tile2.powf(MONOTONICITY_POWER);
        } else {
            monotonicity_right += tile2.powf(MONOTONICITY_POWER) - tile1.powf(MONOTONICITY_POWER);
        }
    }
    (monotonicity_left, monotonicity_right)
}

fn calc_sum(line: &[u64; 4]) -> f64 {
    line.iter()
        .fold(0., |acc, &rank| acc + (rank as f64).powf(SUM_POWER))
        * SUM_WEIGHT
}

fn calc_empty(line: &[u64; 4]) -> f64 {
    line.iter().filter(|&&rank| rank == 0).count() as f64 * EMPTY_WEIGHT
}

/// Weighted merge potential. Runs of equal ranks count `1 + extra` each; empty
/// cells are skipped rather than breaking a run.
fn calc_merges(line: &[u64; 4]) -> f64 {
    let mut prev = 0;
    let mut counter = 0u32;
    let mut merges = 0u32;
    for &rank in line.iter().filter(|&&rank| rank != 0) {
        if prev == rank {
            counter += 1;
        } else if counter > 0 {
            merges += 1 + counter;
            counter = 0;
        }
        prev = rank;
    }
    if counter > 0 {
        merges += 1 + counter;
    }
    f64::from(merges) * MERGES_WEIGHT
}
