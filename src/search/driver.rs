//! The search driver: iterative deepening with aspiration windows, the
//! lazy-SMP worker pool, wall-clock control, and result aggregation.
//!
//! Workers share the transposition table, the evaluation cache, and two
//! flags: the global stop (timeout or host `stop`) and a per-iteration
//! helper stop raised once a winner reports. Each worker owns its
//! position clone, move stack, history, and killers.

use crate::eval::EvalCache;
use crate::movegen::{self, Move};
use crate::position::{Position, Side};
use crate::search::params::SearchParams;
use crate::search::stack::MAX_PLY;
use crate::search::tt::{INFINITE, MATE, MATE_BOUND, TranspositionTable};
use crate::search::worker::{RootResult, SearchWorker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

const ASPIRATION_WINDOW: i32 = 50;
/// Aspiration below this depth searches the full window.
const ASPIRATION_MIN_DEPTH: i32 = 5;
/// Helpers join in above this depth.
const SMP_MIN_DEPTH: i32 = 3;

/// Default evaluation-cache slot count (8 MiB of words).
const EVAL_CACHE_SLOTS: usize = 1 << 20;

/// Shared stop protocol and wall clock. Workers poll `poll` about every
/// 8192 nodes; `stop` from the host and the timeout set the same flag.
pub struct SearchClock {
    start: Instant,
    budget: Mutex<Option<Duration>>,
    deadline: Mutex<Option<Instant>>,
    pondering: AtomicBool,
    stop: AtomicBool,
}

impl SearchClock {
    pub fn new(budget: Option<Duration>, ponder: bool) -> Self {
        let start = Instant::now();
        // While pondering the budget is parked; `ponderhit` arms it.
        let deadline = if ponder { None } else { budget.map(|b| start + b) };
        SearchClock {
            start,
            budget: Mutex::new(budget),
            deadline: Mutex::new(deadline),
            pondering: AtomicBool::new(ponder),
            stop: AtomicBool::new(false),
        }
    }

    /// Unlimited clock; stops only on request.
    pub fn infinite() -> Self {
        Self::new(None, false)
    }

    #[inline(always)]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Idempotent; timeout and host stop share this flag.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// The opponent played the expected move: the clock starts now.
    pub fn ponderhit(&self) {
        if let Some(budget) = *self.budget.lock().unwrap() {
            *self.deadline.lock().unwrap() = Some(Instant::now() + budget);
        }
        self.pondering.store(false, Ordering::Relaxed);
    }

    /// Timeout check; cheap enough for the node-count cadence.
    pub fn poll(&self) {
        if self.stopped() || self.pondering.load(Ordering::Relaxed) {
            return;
        }
        if let Some(deadline) = *self.deadline.lock().unwrap() {
            if Instant::now() >= deadline {
                self.request_stop();
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn remaining(&self) -> Option<Duration> {
        let deadline = (*self.deadline.lock().unwrap())?;
        Some(deadline.saturating_duration_since(Instant::now()))
    }
}

/// Parsed `go` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

impl SearchLimits {
    /// Wall-clock budget for this move. Reserves a safety buffer against
    /// lag, allocates a game-phase-dependent slice, and hard-caps at a
    /// fifth of the remaining time.
    pub fn allocate_time(&self, side: Side) -> Option<Duration> {
        if self.infinite {
            return None;
        }
        if let Some(ms) = self.movetime {
            return Some(Duration::from_millis(ms));
        }

        let (time, inc) = match side {
            Side::White => (self.wtime?, self.winc),
            Side::Black => (self.btime?, self.binc),
        };

        let safety = (time * 15 / 100).min(500);
        let usable = time.saturating_sub(safety);

        let mut alloc = if let Some(mtg) = self.movestogo {
            usable / mtg.max(2) + inc * 3 / 4
        } else if usable > 5000 {
            usable / 40 + inc * 9 / 10
        } else if usable > 2000 {
            usable / 30 + inc * 3 / 4
        } else if usable > 500 {
            usable / 20 + inc / 2
        } else {
            inc / 2 + 20
        };

        alloc = alloc.min(usable / 5).min(usable);
        if alloc < 10 && usable >= 10 {
            alloc = 10;
        }
        Some(Duration::from_millis(alloc))
    }
}

/// One completed iteration, for `info` output.
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub depth: i32,
    pub score: i32,
    pub mate_in: Option<i32>,
    pub nodes: u64,
    pub time_ms: u128,
    pub pv: Vec<Move>,
}

/// Final search outcome.
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub best: Option<Move>,
    pub ponder: Option<Move>,
    pub score: i32,
    pub depth: i32,
    pub nodes: u64,
    pub mate_in: Option<i32>,
    pub pv: Vec<Move>,
}

#[inline]
pub fn mate_in(score: i32) -> Option<i32> {
    if score >= MATE_BOUND {
        Some((MATE - score + 1) / 2)
    } else if score <= -MATE_BOUND {
        Some(-((MATE + score + 1) / 2))
    } else {
        None
    }
}

/// The engine: root position plus the state shared across searches.
#[derive(Clone)]
pub struct Engine {
    pub pos: Position,
    tt: Arc<TranspositionTable>,
    eval_cache: Arc<EvalCache>,
    pub params: SearchParams,
}

impl Engine {
    pub fn new() -> Self {
        let params = SearchParams::default();
        Engine {
            pos: Position::startpos(),
            tt: Arc::new(TranspositionTable::new(params.hash_mb)),
            eval_cache: Arc::new(EvalCache::new(EVAL_CACHE_SLOTS)),
            params,
        }
    }

    /// Replaces the transposition table; resizing always clears.
    pub fn set_hash_size(&mut self, mb: usize) {
        self.params.set_hash_mb(mb);
        self.tt = Arc::new(TranspositionTable::new(self.params.hash_mb));
    }

    pub fn clear_hash(&self) {
        self.tt.clear();
        self.eval_cache.clear();
    }

    pub fn clear_age(&self) {
        self.tt.clear_age();
    }

    pub fn new_game(&mut self) {
        self.pos = Position::startpos();
        self.clear_hash();
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Iterative-deepening search under `clock`. Emits one `SearchInfo`
    /// per completed depth through `on_info`.
    pub fn search(
        &mut self,
        limits: &SearchLimits,
        clock: &SearchClock,
        on_info: &mut dyn FnMut(&SearchInfo),
    ) -> SearchReport {
        self.tt.new_search();

        let max_depth = limits
            .depth
            .unwrap_or(MAX_PLY as i32 - 1)
            .clamp(1, MAX_PLY as i32 - 1);
        let iter_stop = AtomicBool::new(false);

        let mut workers: Vec<SearchWorker> = (0..self.params.threads)
            .map(|_| {
                SearchWorker::new(
                    self.pos.clone(),
                    &self.tt,
                    &self.eval_cache,
                    clock,
                    &iter_stop,
                    self.params.null_move,
                )
            })
            .collect();

        let mut report = SearchReport::default();
        let mut prev_score = 0;
        let mut last_iter = Duration::ZERO;

        for depth in 1..=max_depth {
            clock.poll();
            if clock.stopped() {
                break;
            }
            // Predict the next iteration at 3x the previous one; do not
            // start a depth there is no time to finish.
            if depth > 1 {
                if let Some(remaining) = clock.remaining() {
                    if last_iter * 3 > remaining {
                        break;
                    }
                }
            }
            let iter_start = Instant::now();

            for worker in workers.iter_mut() {
                worker.new_iteration();
            }

            // Aspiration ladder around the previous score: W, then 2W,
            // then 4W, then the full window, each side independently.
            let aspirating = depth >= ASPIRATION_MIN_DEPTH;
            let (mut alpha, mut beta) = if aspirating {
                (prev_score - ASPIRATION_WINDOW, prev_score + ASPIRATION_WINDOW)
            } else {
                (-INFINITE, INFINITE)
            };
            let mut widen_low = 0u32;
            let mut widen_high = 0u32;

            let outcome = loop {
                let result = run_depth(&mut workers, depth, alpha, beta, &iter_stop);
                let Some(result) = result else { break None };
                if clock.stopped() && !result.completed {
                    break None;
                }

                if result.score <= alpha && alpha > -INFINITE {
                    widen_low += 1;
                    alpha = match widen_low {
                        1 => prev_score - ASPIRATION_WINDOW * 2,
                        2 => prev_score - ASPIRATION_WINDOW * 4,
                        _ => -INFINITE,
                    };
                    continue;
                }
                if result.score >= beta && beta < INFINITE {
                    widen_high += 1;
                    beta = match widen_high {
                        1 => prev_score + ASPIRATION_WINDOW * 2,
                        2 => prev_score + ASPIRATION_WINDOW * 4,
                        _ => INFINITE,
                    };
                    continue;
                }
                break Some(result);
            };

            last_iter = iter_start.elapsed();

            let Some(result) = outcome else { break };
            if !result.completed {
                break;
            }

            prev_score = result.score;
            let nodes: u64 = workers.iter().map(|w| w.nodes).sum();
            report = SearchReport {
                best: result.best,
                ponder: result.pv.get(1).copied(),
                score: result.score,
                depth,
                nodes,
                mate_in: mate_in(result.score),
                pv: result.pv.clone(),
            };

            on_info(&SearchInfo {
                depth,
                score: result.score,
                mate_in: report.mate_in,
                nodes,
                time_ms: clock.elapsed().as_millis(),
                pv: result.pv,
            });

            // A forced mate does not get better with depth.
            if result.score.abs() >= MATE_BOUND {
                break;
            }
        }

        // If not even depth 1 completed, any legal move beats none.
        if report.best.is_none() {
            let mut moves = Vec::new();
            movegen::generate_legal(&mut self.pos, &mut moves);
            report.best = moves.first().copied();
            report.nodes = workers.iter().map(|w| w.nodes).sum();
        }
        report
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// One depth across the pool. A single worker (or a shallow depth) runs
/// inline; otherwise every worker is dispatched, the first to return a
/// complete result with a nonempty PV is the winner (channel arrival
/// order settles near-simultaneous finishes), and the rest are stopped
/// through the per-iteration flag.
fn run_depth(
    workers: &mut [SearchWorker],
    depth: i32,
    alpha: i32,
    beta: i32,
    iter_stop: &AtomicBool,
) -> Option<RootResult> {
    iter_stop.store(false, Ordering::Relaxed);

    if workers.len() == 1 || depth <= SMP_MIN_DEPTH {
        let result = workers[0].search_root(depth, alpha, beta);
        return Some(result);
    }

    let (tx, rx) = mpsc::channel::<RootResult>();
    thread::scope(|scope| {
        for (index, worker) in workers.iter_mut().enumerate() {
            // Odd-indexed helpers search one ply deeper for diversity.
            let target = if index % 2 == 0 {
                depth
            } else {
                (depth + 1).min(MAX_PLY as i32 - 1)
            };
            let tx = tx.clone();
            scope.spawn(move || {
                let result = worker.search_root(target, alpha, beta);
                let _ = tx.send(result);
            });
        }
        drop(tx);

        // The first completed result with a nonempty PV wins and stops
        // the other workers. A completed window miss (fail-low: no move
        // beat alpha, so no PV was recorded) must not end the iteration
        // early; it is kept only so the aspiration ladder can widen.
        let mut winner: Option<RootResult> = None;
        let mut window_miss: Option<RootResult> = None;
        while let Ok(result) = rx.recv() {
            if winner.is_some() || !result.completed {
                continue;
            }
            if !result.pv.is_empty() {
                winner = Some(result);
                iter_stop.store(true, Ordering::Relaxed);
            } else if window_miss.is_none() {
                window_miss = Some(result);
            }
        }
        winner.or(window_miss)
    })
}
