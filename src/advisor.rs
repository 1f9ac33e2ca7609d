//! Background move advice for an interactive game loop.
//!
//! [`Advisor`] runs one [`Expectimax`] evaluation at a time on a worker thread and
//! hands the result back through a non-blocking poll, so the loop that owns the
//! board never waits on the search:
//!
//! - `trigger(grid)` after every board change (starts a search or publishes "no move"),
//! - `poll()` once per tick,
//! - `cancel()` before committing a move while a search is still running.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use ai_2048_advisor::advisor::{Advisor, AdvisorConfig};
//! use ai_2048_advisor::engine::Move;
//! use ai_2048_advisor::expectimax::ExpectimaxConfig;
//!
//! let cfg = AdvisorConfig {
//!     search: ExpectimaxConfig { depth_cap: Some(2), ..Default::default() },
//!     ..Default::default()
//! };
//! let mut advisor = Advisor::new(cfg);
//! advisor.trigger(&[[0, 2, 4, 8], [0, 4, 8, 2], [0, 2, 4, 8], [0, 4, 8, 2]]).unwrap();
//!
//! let deadline = Instant::now() + Duration::from_secs(30);
//! let advice = loop {
//!     if let Some(advice) = advisor.poll() { break advice; }
//!     assert!(Instant::now() < deadline);
//!     std::thread::sleep(Duration::from_millis(1));
//! };
//! assert_eq!(advice.best, Some(Move::Left));
//! assert_eq!(advisor.published(), advice);
//! ```

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::{self, Board, Grid};
use crate::expectimax::{CancelToken, Expectimax, ExpectimaxConfig, MoveAdvice, SearchError};

/// How long `cancel` waits for a running search to notice the cancellation.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(50);

const WORKER_NAME: &str = "advisor-eval";

/// Failure to get a background evaluation going.
#[derive(thiserror::Error, Debug)]
pub enum AdvisorError {
    #[error("failed to spawn evaluation worker: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Search settings handed to every worker.
    pub search: ExpectimaxConfig,
    /// Bounded wait in [`Advisor::cancel`].
    pub cancel_grace: Duration,
    /// Whether `trigger` starts evaluations at all.
    pub enabled: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self { search: ExpectimaxConfig::default(), cancel_grace: DEFAULT_CANCEL_GRACE, enabled: true }
    }
}

/// Read handle to the most recently published advice, cloneable across threads.
#[derive(Debug, Clone)]
pub struct PublishedAdvice(Arc<Mutex<MoveAdvice>>);

impl PublishedAdvice {
    fn new() -> Self { PublishedAdvice(Arc::new(Mutex::new(MoveAdvice::NONE))) }

    /// Copy of the current advice.
    pub fn get(&self) -> MoveAdvice {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, advice: MoveAdvice) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = advice;
    }
}

/// One in-flight evaluation. The worker owns its grid and evaluator outright.
struct Job {
    cancel: CancelToken,
    rx: Receiver<Result<MoveAdvice, SearchError>>,
    handle: JoinHandle<()>,
}

/// Runs at most one background evaluation and publishes its result.
pub struct Advisor {
    cfg: AdvisorConfig,
    enabled: bool,
    evaluating: bool,
    published: PublishedAdvice,
    job: Option<Job>,
}

impl Advisor {
    /// Build the engine tables on the calling thread, before any worker can exist.
    pub fn new(cfg: AdvisorConfig) -> Self {
        engine::new();
        let enabled = cfg.enabled;
        Self { cfg, enabled, evaluating: false, published: PublishedAdvice::new(), job: None }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool { self.enabled }

    /// True between `start` and the poll/cancel that retires the evaluation.
    #[inline]
    pub fn is_evaluating(&self) -> bool { self.evaluating }

    /// Most recently published advice.
    #[inline]
    pub fn published(&self) -> MoveAdvice { self.published.get() }

    /// Handle for reading the published advice from another thread (e.g. a renderer).
    pub fn subscribe(&self) -> PublishedAdvice { self.published.clone() }

    /// Turn advice on or off. Turning it off cancels any running search and
    /// resets the published advice to "no move".
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
            self.published.set(MoveAdvice::NONE);
        }
    }

    /// React to a new board: evaluate it if it has a legal move, otherwise publish
    /// "no move". Does nothing while disabled.
    pub fn trigger(&mut self, grid: &Grid) -> Result<(), AdvisorError> {
        if !self.enabled {
            return Ok(());
        }
        if Board::from_grid(grid).has_legal_move() {
            self.start(grid)
        } else {
            self.cancel();
            self.published.set(MoveAdvice::NONE);
            Ok(())
        }
    }

    /// Start evaluating a snapshot of `grid` in the background, cancelling any
    /// evaluation still in flight.
    pub fn start(&mut self, grid: &Grid) -> Result<(), AdvisorError> {
        self.cancel();
        let grid = *grid;
        let search_cfg = self.cfg.search.clone();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new().name(WORKER_NAME.to_string()).spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                Expectimax::with_config(search_cfg).best_move_cancellable(&grid, &worker_cancel)
            }))
            .unwrap_or(Err(SearchError::WorkerPanicked));
            // The advisor may have stopped listening; that is not the worker's problem.
            let _ = tx.send(outcome);
        })?;
        self.job = Some(Job { cancel, rx, handle });
        self.evaluating = true;
        Ok(())
    }

    /// Non-blocking check for a finished evaluation.
    ///
    /// Publishes and returns the advice when a search completed normally. Any
    /// finished outcome, good or bad, ends the evaluation.
    pub fn poll(&mut self) -> Option<MoveAdvice> {
        let outcome = match self.job.as_ref()?.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(SearchError::WorkerDisconnected),
        };
        let job = self.job.take()?;
        self.evaluating = false;
        let cancelled = job.cancel.is_cancelled();
        let _ = job.handle.join();
        match outcome {
            Ok(advice) if !cancelled => {
                self.published.set(advice);
                Some(advice)
            }
            Ok(_) | Err(SearchError::Cancelled) => {
                log::debug!("discarding cancelled evaluation");
                None
            }
            Err(e) => {
                log::warn!("background evaluation produced no advice: {e}");
                None
            }
        }
    }

    /// Ask the running evaluation to stop and wait briefly for it.
    ///
    /// Whatever it produces is discarded. A worker that outlives the grace period
    /// is left to finish on its own; it holds no reference back into the advisor.
    ///
    /// Returns `true` when no worker is left running: either nothing was in flight
    /// or the worker was joined within the grace period.
    pub fn cancel(&mut self) -> bool {
        let Some(job) = self.job.take() else { return true };
        self.evaluating = false;
        job.cancel.cancel();
        match job.rx.recv_timeout(self.cfg.cancel_grace) {
            Ok(_) => {
                let _ = job.handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("evaluation worker still running after {:?}; detaching it", self.cfg.cancel_grace);
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("evaluation worker exited without a result");
                let _ = job.handle.join();
                true
            }
        }
    }
}

impl Default for Advisor { fn default() -> Self { Self::new(AdvisorConfig::default()) } }

impl Drop for Advisor {
    fn drop(&mut self) {
        self.cancel();
    }
}
