//! The search core: depth-first negamax with alpha-beta pruning, check
//! extension, null-move pruning, razoring/futility, late-move reduction,
//! principal-variation search, and a capture-only quiescence extension.
//!
//! One `SearchWorker` per thread. Workers share the transposition table,
//! the evaluation cache, and the stop protocol; everything else (the
//! position, the per-ply move stack, history, killers, the PV) is owned.

use crate::eval::{self, EvalCache};
use crate::movegen::{self, Move};
use crate::position::{Piece, Position};
use crate::search::driver::SearchClock;
use crate::search::picker;
use crate::search::stack::{HistoryTable, Killers, MAX_PLY, MoveStack, PvTable};
use crate::search::tt::{Bound, INFINITE, MATE, MATE_BOUND, TranspositionTable};
use std::sync::atomic::{AtomicBool, Ordering};

/// Stop-flag poll cadence in visited nodes.
const POLL_MASK: u64 = 8191;

/// Futility margins by remaining depth; index 3 razors instead.
const FUTILITY_MARGIN: [i32; 4] = [0, 100, 200, 300];

/// Quiescence delta-pruning slack on top of the captured value.
const DELTA_MARGIN: i32 = 200;

const LMR_MIN_DEPTH: i32 = 3;
const LMR_MOVE_THRESHOLD: usize = 4;

/// Outcome of one root-depth search on one worker.
#[derive(Debug, Clone)]
pub struct RootResult {
    pub score: i32,
    pub best: Option<Move>,
    pub pv: Vec<Move>,
    /// True when the root move loop ran to completion; a cancelled
    /// iteration's output is only trusted when at least one root move
    /// finished, and never supersedes a completed one.
    pub completed: bool,
}

pub struct SearchWorker<'a> {
    pub pos: Position,
    stack: MoveStack,
    pv: PvTable,
    history: HistoryTable,
    killers: Killers,
    tt: &'a TranspositionTable,
    eval_cache: &'a EvalCache,
    clock: &'a SearchClock,
    iter_stop: &'a AtomicBool,
    null_move_enabled: bool,
    pub nodes: u64,
}

impl<'a> SearchWorker<'a> {
    pub fn new(
        pos: Position,
        tt: &'a TranspositionTable,
        eval_cache: &'a EvalCache,
        clock: &'a SearchClock,
        iter_stop: &'a AtomicBool,
        null_move_enabled: bool,
    ) -> Self {
        SearchWorker {
            pos,
            stack: MoveStack::new(),
            pv: PvTable::new(),
            history: HistoryTable::new(),
            killers: Killers::new(),
            tt,
            eval_cache,
            clock,
            iter_stop,
            null_move_enabled,
            nodes: 0,
        }
    }

    /// Ages the quiet-move heuristics between iterations.
    pub fn new_iteration(&mut self) {
        self.history.decay();
    }

    #[inline(always)]
    fn aborted(&self) -> bool {
        self.clock.stopped() || self.iter_stop.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn tick(&mut self) {
        self.nodes += 1;
        if self.nodes & POLL_MASK == 0 {
            self.clock.poll();
        }
    }

    /// Near-zero draw score shaded by the lazy material balance so a
    /// side ahead in material avoids liquidating into repetitions; the
    /// shading stays stable under zero-width windows.
    #[inline(always)]
    fn draw_score(&self) -> i32 {
        -(eval::material_balance(&self.pos) / 32).clamp(-8, 8)
    }

    /// Searches the root position at `depth` inside `(alpha, beta)`.
    pub fn search_root(&mut self, depth: i32, mut alpha: i32, beta: i32) -> RootResult {
        self.pv.clear();
        let key = self.pos.zobrist;
        let hint = self.tt.hint_for(key);
        let in_check_now = self.pos.in_check(self.pos.side_to_move);

        {
            let list = self.stack.at(0);
            list.clear();
            movegen::generate_all(&self.pos, list);
            picker::score_moves(list, hint, self.killers.at(0), &self.history);
        }

        let original_alpha = alpha;
        let mut best = -INFINITE;
        let mut best_move = None;
        let mut searched = 0usize;
        let mut completed = true;

        loop {
            let Some(mv) = self.stack.at(0).pick_next() else {
                break;
            };
            let (undo, legal) = self.pos.make(mv);
            if !legal {
                self.pos.unmake(mv, undo);
                continue;
            }

            let extension = i32::from(in_check_now);
            let score = if searched == 0 {
                -self.negamax(depth - 1 + extension, 1, -beta, -alpha, true)
            } else {
                let zero = -self.negamax(depth - 1 + extension, 1, -alpha - 1, -alpha, true);
                if zero > alpha && zero < beta {
                    -self.negamax(depth - 1 + extension, 1, -beta, -alpha, true)
                } else {
                    zero
                }
            };
            self.pos.unmake(mv, undo);

            if self.aborted() {
                completed = false;
                break;
            }
            searched += 1;

            if score > best {
                best = score;
                best_move = Some(mv);
            }
            if score > alpha {
                alpha = score;
                self.pv.record(0, mv);
            }
            if score >= beta {
                break;
            }
        }

        if searched == 0 && completed {
            // Mate or stalemate at the root; the driver reports it as a
            // terminal score with no move.
            let score = if in_check_now { -MATE } else { self.draw_score() };
            return RootResult {
                score,
                best: None,
                pv: Vec::new(),
                completed,
            };
        }

        if completed {
            let bound = if best >= beta {
                Bound::Lower
            } else if best > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.tt.store(key, best, depth, bound, best_move, 0);
        }

        RootResult {
            score: best,
            best: best_move,
            pv: self.pv.line(0).to_vec(),
            completed: completed && searched > 0,
        }
    }

    fn negamax(
        &mut self,
        depth: i32,
        ply: usize,
        mut alpha: i32,
        beta: i32,
        allow_null: bool,
    ) -> i32 {
        self.tick();
        if self.aborted() {
            return 0;
        }
        self.pv.reset(ply);

        // Drawn on the spot: repetition, the fifty-move rule, or a dead
        // position. Never taken at the root.
        if self.pos.is_repetition()
            || self.pos.is_fifty_move_draw()
            || self.pos.is_insufficient_material()
        {
            return self.draw_score();
        }

        if ply >= MAX_PLY - 1 {
            return eval::evaluate(&self.pos, alpha, beta, self.eval_cache);
        }

        let in_check_now = self.pos.in_check(self.pos.side_to_move);
        let extension = i32::from(in_check_now);
        let mut depth = depth + extension;

        if depth <= 0 {
            return self.quiescence(ply, alpha, beta);
        }

        let key = self.pos.zobrist;
        let mut hint = None;
        if let Some(hit) = self.tt.probe(key, depth, ply as i32) {
            hint = hit.hint;
            match hit.bound {
                Bound::Exact => return hit.score,
                Bound::Lower if hit.score >= beta => return hit.score,
                Bound::Upper if hit.score <= alpha => return hit.score,
                _ => {}
            }
        }
        if hint.is_none() {
            hint = self.tt.hint_for(key);
        }

        let lazy = eval::material_balance(&self.pos);

        // Null move: hand the opponent a free tempo; if the reduced
        // search still fails high the real move would only do better.
        let reduction = 3 + depth / 6;
        if self.null_move_enabled
            && allow_null
            && !in_check_now
            && depth > reduction + 1
            && self.pos.has_non_pawn_material(self.pos.side_to_move)
        {
            let undo = self.pos.make_null();
            let score =
                -self.negamax(depth - reduction - 1, ply + 1, -beta, -beta + 1, false);
            self.pos.unmake_null(undo);
            if self.aborted() {
                return 0;
            }
            if score >= beta && score < MATE_BOUND {
                return beta;
            }
        }

        // Razoring at depth 3, per-move futility below that.
        let mut futile = false;
        if depth <= 3 && !in_check_now && lazy + FUTILITY_MARGIN[depth as usize] <= alpha {
            if depth == 3 {
                depth -= 1;
            } else {
                futile = true;
            }
        }

        {
            let list = self.stack.at(ply);
            list.clear();
            movegen::generate_all(&self.pos, list);
            picker::score_moves(list, hint, self.killers.at(ply), &self.history);
        }

        let original_alpha = alpha;
        let mut best = -INFINITE;
        let mut best_move = None;
        let mut searched = 0usize;

        loop {
            let Some(mv) = self.stack.at(ply).pick_next() else {
                break;
            };
            let (undo, legal) = self.pos.make(mv);
            if !legal {
                self.pos.unmake(mv, undo);
                continue;
            }
            let gives_check = self.pos.in_check(self.pos.side_to_move);

            // Futility: a quiet, non-checking move cannot lift a buried
            // lazy score over alpha. Captures and promotions are exempt
            // (quiescence owns those), and at least one move is always
            // searched.
            if futile
                && searched > 0
                && !gives_check
                && mv.is_quiet()
                && lazy + mv.captured_value() <= alpha
            {
                self.pos.unmake(mv, undo);
                continue;
            }

            // Late-move reduction: verify late quiets two plies shallower
            // with a zero-width window and drop them on a miss.
            if searched >= LMR_MOVE_THRESHOLD
                && depth >= LMR_MIN_DEPTH
                && !in_check_now
                && mv.is_quiet()
            {
                let reduced = -self.negamax(depth - 2, ply + 1, -(alpha + 1), -alpha, true);
                if self.aborted() {
                    self.pos.unmake(mv, undo);
                    return 0;
                }
                if reduced <= alpha {
                    self.pos.unmake(mv, undo);
                    searched += 1;
                    continue;
                }
            }

            // Principal-variation search.
            let score = if searched == 0 {
                -self.negamax(depth - 1, ply + 1, -beta, -alpha, true)
            } else {
                let zero = -self.negamax(depth - 1, ply + 1, -alpha - 1, -alpha, true);
                if zero > alpha && zero < beta {
                    -self.negamax(depth - 1, ply + 1, -beta, -alpha, true)
                } else {
                    zero
                }
            };
            self.pos.unmake(mv, undo);
            searched += 1;

            if self.aborted() {
                return 0;
            }

            if score > best {
                best = score;
                best_move = Some(mv);
            }
            if score >= beta {
                self.tt.store(key, beta, depth, Bound::Lower, Some(mv), ply as i32);
                if mv.is_quiet() {
                    self.killers.insert(ply, mv);
                    self.history.reward(mv, depth);
                }
                return beta;
            }
            if score > alpha {
                alpha = score;
                self.pv.record(ply, mv);
            }
        }

        if searched == 0 {
            return if in_check_now {
                -MATE + ply as i32
            } else {
                self.draw_score()
            };
        }

        let bound = if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt.store(key, best, depth, bound, best_move, ply as i32);
        best
    }

    /// Horizon extension over forcing moves. Fail-hard.
    fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        self.tick();
        if self.aborted() {
            return 0;
        }

        let stand_pat = eval::evaluate(&self.pos, alpha, beta, self.eval_cache);
        if ply >= MAX_PLY - 1 {
            return stand_pat;
        }
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        // Delta pruning: when even the largest possible swing cannot
        // reach alpha, stop here. The margin doubles while a promotion
        // is available.
        let side = self.pos.side_to_move;
        let seventh = match side {
            crate::position::Side::White => crate::bitboard::RANK_7,
            crate::position::Side::Black => crate::bitboard::RANK_2,
        };
        let promo_possible = self.pos.bb(side, Piece::Pawn) & seventh != 0;
        let big_margin = Piece::Queen.value() * if promo_possible { 2 } else { 1 };
        if stand_pat + big_margin < alpha {
            return alpha;
        }

        {
            let list = self.stack.at(ply);
            list.clear();
            movegen::generate_captures(&self.pos, list);
            picker::score_captures(list);
        }

        loop {
            let Some(mv) = self.stack.at(ply).pick_next() else {
                break;
            };
            // Per-capture delta: this victim cannot make up the deficit.
            if !mv.is_promotion() && stand_pat + mv.captured_value() + DELTA_MARGIN < alpha {
                continue;
            }

            let (undo, legal) = self.pos.make(mv);
            if !legal {
                self.pos.unmake(mv, undo);
                continue;
            }
            let score = -self.quiescence(ply + 1, -beta, -alpha);
            self.pos.unmake(mv, undo);

            if self.aborted() {
                return 0;
            }
            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }
}
