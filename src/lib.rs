//! ai-2048-advisor: move advice for 2048 boards.
//!
//! This crate provides:
//! - A compact `Board` bitboard with precomputed move tables (`engine` module)
//! - The static line/board heuristic used at search leaves (`heuristic` module)
//! - An Expectimax evaluator that scores all four moves (`expectimax` module)
//! - A background advisor with start/poll/cancel semantics for game loops (`advisor` module)
//!
//! Directions are always indexed `0 = up`, `1 = down`, `2 = left`, `3 = right`, and
//! per-move scores come back in that order.
//!
//! Quick start:
//! ```
//! use ai_2048_advisor::engine::{self as GameEngine, Board, Move};
//! use ai_2048_advisor::expectimax::{Expectimax, ExpectimaxConfig};
//!
//! // One-time table init (constructors also do this)
//! GameEngine::new();
//!
//! let grid = [[2, 2, 0, 0], [0, 4, 0, 0], [0, 0, 0, 0], [0, 0, 0, 2]];
//! let b = Board::from_grid(&grid);
//! assert_eq!(b.shift(Move::Left).to_grid()[0], [4, 0, 0, 0]);
//!
//! let mut ex = Expectimax::with_config(ExpectimaxConfig { depth_cap: Some(2), ..Default::default() });
//! let advice = ex.best_move(&grid);
//! assert!(advice.best.is_some());
//! assert_eq!(advice.percentages().iter().sum::<i32>(), 100);
//! ```
//!
//! Logging goes through the `log` facade; install any logger to see per-evaluation
//! search statistics at debug level.
//!
pub mod advisor;
pub mod engine;
pub mod expectimax;
pub mod heuristic;
