//! Expectimax move evaluation for 2048.
//!
//! [`Expectimax`] scores the four moves of a board by alternating max nodes (the
//! player picks a direction) and chance nodes (a 2 or 4 spawns in an empty cell),
//! falling back to the static [`heuristic`](crate::heuristic) when a branch becomes
//! too improbable or too deep. Scores come back in direction-index order
//! `[up, down, left, right]`.
//!
//! Notes
//! - The engine tables are built once behind a call-once barrier; constructors
//!   make sure they exist before any search runs.
//! - Expectimax is deterministic; spawn probabilities are modeled analytically.
//!
//! Quick start
//! ```
//! use ai_2048_advisor::engine::Move;
//! use ai_2048_advisor::expectimax::{Expectimax, ExpectimaxConfig};
//!
//! let grid = [[0, 2, 4, 8], [0, 4, 8, 2], [0, 2, 4, 8], [0, 4, 8, 2]];
//! let mut ex = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(2), ..Default::default() });
//! let advice = ex.best_move(&grid);
//! // Only a left move changes this board.
//! assert_eq!(advice.best, Some(Move::Left));
//! assert_eq!(advice.best_index(), 2);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::{self, Move};

mod search;

pub use search::Expectimax;

/// Default probability cutoff for chance-node pruning.
pub const PROB_CUTOFF: f32 = 1e-4;
/// Default ceiling below which chance nodes use the transposition cache.
pub const CACHE_DEPTH_LIMIT: u32 = 15;
/// Added to every legal top-level score so a legal move always outranks an illegal one.
pub const TIE_BREAK_EPSILON: f64 = 1e-6;

/// Knobs for Expectimax. Defaults reproduce the advisor's fixed behavior.
///
/// - `prob_cutoff`: prune chance branches when cumulative probability falls below this value.
/// - `depth_cap`: optional hard cap for the adaptive depth limit.
/// - `cache_enabled`: enable/disable transposition table usage.
/// - `cache_depth_limit`: only nodes shallower than this consult or fill the cache.
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    /// Probability cutoff for chance-node pruning.
    pub prob_cutoff: f32,
    /// Optional hard cap on depth (None keeps the adaptive depth uncapped).
    pub depth_cap: Option<u32>,
    /// Enable/disable transposition caching.
    pub cache_enabled: bool,
    /// Depth ceiling for cache lookups and inserts.
    pub cache_depth_limit: u32,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: PROB_CUTOFF,
            depth_cap: None,
            cache_enabled: true,
            cache_depth_limit: CACHE_DEPTH_LIMIT,
        }
    }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board; `ev` is then 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Move-node expansions (one per direction tried).
    pub nodes: u64,
    /// Largest `nodes` seen since the last reset.
    pub peak_nodes: u64,
    /// Chance nodes answered from the transposition cache.
    pub cache_hits: u64,
    /// Deepest chance node that fell back to the heuristic.
    pub max_depth: u32,
    /// Depth limit used for the evaluation.
    pub depth_limit: u32,
}

/// Best direction and the per-direction scores it was picked from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveAdvice {
    /// `None` when no direction changes the board.
    pub best: Option<Move>,
    /// Expected scores in direction-index order; 0.0 for illegal directions.
    pub scores: [f64; 4],
}

impl MoveAdvice {
    /// Neutral advice: no move, all scores zero.
    pub const NONE: MoveAdvice = MoveAdvice { best: None, scores: [0.0; 4] };

    /// Pick the arg-max of `scores`, ties going to the lowest index.
    ///
    /// A direction must score strictly above zero to be picked.
    pub fn from_scores(scores: [f64; 4]) -> Self {
        let mut best = None;
        let mut best_score = 0.0;
        for (dir, &score) in Move::ALL.iter().zip(scores.iter()) {
            if score > best_score {
                best_score = score;
                best = Some(*dir);
            }
        }
        MoveAdvice { best, scores }
    }

    /// Direction index of the best move, or -1 when there is none.
    #[inline]
    pub fn best_index(&self) -> i32 {
        self.best.map_or(-1, |dir| dir.index() as i32)
    }

    /// Relative weight of each direction in whole percent.
    ///
    /// Softmax over `score / 1000`, each share rounded to the nearest percent. Any
    /// rounding remainder goes to slot 0 (up), not to the best direction.
    ///
    /// ```
    /// use ai_2048_advisor::expectimax::MoveAdvice;
    /// assert_eq!(MoveAdvice::NONE.percentages(), [25, 25, 25, 25]);
    /// let p = MoveAdvice::from_scores([0.0, 0.0, 0.0, 10_000.0]).percentages();
    /// assert_eq!(p.iter().sum::<i32>(), 100);
    /// assert_eq!(p[3], 100);
    /// ```
    pub fn percentages(&self) -> [i32; 4] {
        const TEMPERATURE: f64 = 1000.0;
        let max_score = self.scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp_scores = self.scores.map(|s| ((s - max_score) / TEMPERATURE).exp());
        let sum_exp: f64 = exp_scores.iter().sum();
        let mut percentages = exp_scores.map(|e| (e / sum_exp * 100.0 + 0.5) as i32);
        let assigned: i32 = percentages.iter().sum();
        percentages[0] += 100 - assigned;
        percentages
    }
}

/// Why an evaluation produced no result.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("evaluation was cancelled")]
    Cancelled,
    #[error("evaluation worker panicked")]
    WorkerPanicked,
    #[error("evaluation worker exited without a result")]
    WorkerDisconnected,
}

/// Cooperative cancellation signal shared between a caller and a running search.
///
/// The search checks it at every move and chance node and unwinds as soon as it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    /// Ask every search holding this token to stop.
    #[inline]
    pub fn cancel(&self) { self.0.store(true, Ordering::Release); }

    #[inline]
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine() {
    // Safe to call multiple times.
    engine::new();
}
