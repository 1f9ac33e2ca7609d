use std::collections::HashMap;

use crate::engine::{Board, Grid, Move};
use crate::heuristic::board_heuristic;

use super::{warm_engine, BranchEval, CancelToken, ExpectimaxConfig, MoveAdvice, SearchError, SearchStats, TIE_BREAK_EPSILON};

#[derive(Clone, Copy)]
struct TranspositionEntry { score: f64, depth: u32 }

type TranspositionTable = HashMap<Board, TranspositionEntry>;

/// Mutable state threaded through one top-level move's search.
///
/// The cache is shared by the four top-level moves of one evaluation and dropped
/// with it.
struct EvalState<'a> {
    cache: &'a mut TranspositionTable,
    cancel: &'a CancelToken,
    cur_depth: u32,
    max_depth: u32,
    depth_limit: u32,
    cache_hits: u64,
    nodes: u64,
}

/// Single-threaded Expectimax search.
///
/// Every evaluation builds its own transposition table, so separate instances never
/// share state and one instance never carries state from one call to the next.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Score all four directions of a grid, in order `[up, down, left, right]`.
    ///
    /// Illegal directions score exactly 0.
    ///
    /// ```
    /// use ai_2048_advisor::expectimax::{Expectimax, ExpectimaxConfig};
    /// let mut ex = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(2), ..Default::default() });
    /// let scores = ex.evaluate_all_moves(&[[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]]);
    /// assert_eq!(scores[0], 0.0); // up
    /// assert!(scores[1] > 0.0);   // down
    /// ```
    pub fn evaluate_all_moves(&mut self, grid: &Grid) -> [f64; 4] {
        self.branch_evals(Board::from_grid(grid)).map(|branch| branch.ev)
    }

    /// Best direction for a grid plus the scores it was chosen from.
    ///
    /// Ties go to the lowest direction index; a board with no legal move yields
    /// [`MoveAdvice::NONE`].
    pub fn best_move(&mut self, grid: &Grid) -> MoveAdvice {
        self.advise_board(Board::from_grid(grid))
    }

    /// [`Self::best_move`] on an already packed board.
    pub fn advise_board(&mut self, board: Board) -> MoveAdvice {
        MoveAdvice::from_scores(self.branch_evals(board).map(|branch| branch.ev))
    }

    /// [`Self::best_move`] that gives up as soon as `cancel` is set.
    pub fn best_move_cancellable(&mut self, grid: &Grid, cancel: &CancelToken) -> Result<MoveAdvice, SearchError> {
        let branches = self.branch_evals_cancellable(Board::from_grid(grid), cancel)?;
        Ok(MoveAdvice::from_scores(branches.map(|branch| branch.ev)))
    }

    /// Compute EV for each direction.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        self.run_branches(board, &CancelToken::new())
    }

    /// [`Self::branch_evals`] that reports [`SearchError::Cancelled`] once `cancel` is set.
    pub fn branch_evals_cancellable(&mut self, board: Board, cancel: &CancelToken) -> Result<[BranchEval; 4], SearchError> {
        let out = self.run_branches(board, cancel);
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        Ok(out)
    }

    /// Score one top-level direction in isolation, with a fresh cache.
    ///
    /// A direction that does not change the board scores exactly 0 and is not searched.
    pub fn score_top_level_move(&mut self, board: Board, dir: Move) -> f64 {
        let mut cache = TranspositionTable::new();
        let mut stats = SearchStats::default();
        let score = self.top_level_score(board, dir, &mut cache, &CancelToken::new(), &mut stats);
        self.record_stats(stats);
        score
    }

    /// Statistics collected from the last evaluation.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    /// Adaptive depth: boards with more distinct tiles are searched less deeply.
    #[inline]
    fn compute_depth(&self, board: Board) -> u32 {
        let dyn_depth = 3u32.max(board.count_distinct().saturating_sub(2));
        match self.cfg.depth_cap { Some(cap) => dyn_depth.min(cap), None => dyn_depth }
    }

    fn run_branches(&mut self, board: Board, cancel: &CancelToken) -> [BranchEval; 4] {
        let mut cache = TranspositionTable::new();
        let mut stats = SearchStats::default();
        let mut out = Move::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false });
        for branch in out.iter_mut() {
            if cancel.is_cancelled() {
                break;
            }
            branch.legal = board.shift(branch.dir) != board;
            branch.ev = self.top_level_score(board, branch.dir, &mut cache, cancel, &mut stats);
        }
        log::debug!(
            "evaluated {:?}: depth limit {}, {} nodes, {} cache hits, {} cached boards",
            board,
            stats.depth_limit,
            stats.nodes,
            stats.cache_hits,
            cache.len()
        );
        self.record_stats(stats);
        out
    }

    fn record_stats(&mut self, stats: SearchStats) {
        self.stats = SearchStats { peak_nodes: self.stats.peak_nodes.max(stats.nodes), ..stats };
    }

    fn top_level_score(
        &self,
        board: Board,
        dir: Move,
        cache: &mut TranspositionTable,
        cancel: &CancelToken,
        stats: &mut SearchStats,
    ) -> f64 {
        let new_board = board.shift(dir);
        if new_board == board {
            return 0.0;
        }
        let depth_limit = self.compute_depth(board);
        let mut state = EvalState { cache, cancel, cur_depth: 0, max_depth: 0, depth_limit, cache_hits: 0, nodes: 0 };
        let score = self.score_chance_node(&mut state, new_board, 1.0) + TIE_BREAK_EPSILON;
        stats.nodes += state.nodes;
        stats.cache_hits += state.cache_hits;
        stats.max_depth = stats.max_depth.max(state.max_depth);
        stats.depth_limit = depth_limit;
        score
    }

    fn score_move_node(&self, state: &mut EvalState<'_>, board: Board, cum_prob: f32) -> f64 {
        if state.cancel.is_cancelled() {
            return 0.0;
        }
        let mut best_score = 0.0f64;
        state.cur_depth += 1;
        for direction in Move::ALL {
            let new_board = board.shift(direction);
            state.nodes += 1;
            if new_board != board {
                best_score = best_score.max(self.score_chance_node(state, new_board, cum_prob));
            }
        }
        state.cur_depth -= 1;
        best_score
    }

    fn score_chance_node(&self, state: &mut EvalState<'_>, board: Board, cum_prob: f32) -> f64 {
        if state.cancel.is_cancelled() {
            return 0.0;
        }
        if cum_prob < self.cfg.prob_cutoff || state.cur_depth >= state.depth_limit {
            state.max_depth = state.max_depth.max(state.cur_depth);
            return board_heuristic(board);
        }
        // An entry recorded at depth d carries at least as much lookahead as any query at depth >= d.
        // Reusing it can still change the result once probability pruning depends on the
        // path, so scores only match an uncached search when the depth limit is at most 2.
        let cacheable = self.cfg.cache_enabled && state.cur_depth < self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(entry) = state.cache.get(&board) {
                if entry.depth <= state.cur_depth {
                    state.cache_hits += 1;
                    return entry.score;
                }
            }
        }
        let num_empty_tiles = board.count_empty();
        if num_empty_tiles == 0 {
            return 0.0;
        }
        let base_prob = cum_prob / num_empty_tiles as f32;
        let mut tiles_searched = 0;
        let mut tmp = board.raw();
        let mut insert_tile = 1u64;
        let mut score = 0.0;
        while tiles_searched < num_empty_tiles {
            if (tmp & 0xf) == 0 {
                let new_board2 = Board::from_raw(board.raw() | insert_tile);
                score += self.score_move_node(state, new_board2, base_prob * 0.9) * 0.9;
                let new_board4 = Board::from_raw(board.raw() | (insert_tile << 1));
                score += self.score_move_node(state, new_board4, base_prob * 0.1) * 0.1;
                tiles_searched += 1;
            }
            tmp >>= 4;
            insert_tile <<= 4;
        }
        score /= num_empty_tiles as f64;
        if cacheable {
            state.cache.insert(board, TranspositionEntry { score, depth: state.cur_depth });
        }
        score
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }
