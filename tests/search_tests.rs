//! End-to-end search scenarios: mates, draws, the quiescence horizon,
//! and score stability across iterative deepening.

use meridian::movegen::generate_legal;
use meridian::position::Position;
use meridian::search::driver::{SearchClock, SearchLimits, SearchReport};
use meridian::search::{Engine, MATE_BOUND};
use std::str::FromStr;

fn search_depth(fen: &str, depth: i32) -> SearchReport {
    let mut engine = Engine::new();
    engine.pos = Position::from_str(fen).unwrap();
    let limits = SearchLimits {
        depth: Some(depth),
        ..Default::default()
    };
    let clock = SearchClock::infinite();
    engine.search(&limits, &clock, &mut |_| {})
}

/// Plays the reported best move and classifies the resulting position.
fn after_best(fen: &str, report: &SearchReport) -> (bool, bool) {
    let mut pos = Position::from_str(fen).unwrap();
    let mv = report.best.expect("search must produce a move");
    let (_, legal) = pos.make(mv);
    assert!(legal, "best move {} is illegal in {}", mv, fen);
    let mut replies = Vec::new();
    generate_legal(&mut pos, &mut replies);
    let in_check = pos.in_check(pos.side_to_move);
    (replies.is_empty() && in_check, replies.is_empty() && !in_check)
}

#[test]
fn finds_mate_in_one() {
    let fen = "4k3/8/4K3/8/8/8/8/6Q1 w - - 0 1";
    let report = search_depth(fen, 5);
    assert!(
        report.score >= MATE_BOUND,
        "expected a mate score, got {}",
        report.score
    );
    assert_eq!(report.mate_in, Some(1));
    let (is_mate, _) = after_best(fen, &report);
    assert!(is_mate, "best move must deliver mate");
}

#[test]
fn avoids_stalemate_when_mating() {
    // The queen can end the game at once; any stalemating squeeze would
    // throw the win away.
    let fen = "7k/5K2/6Q1/8/8/8/8/8 w - - 0 1";
    let report = search_depth(fen, 6);
    assert!(
        report.score >= MATE_BOUND,
        "winning side must keep the mate score, got {}",
        report.score
    );
    let (is_mate, is_stalemate) = after_best(fen, &report);
    assert!(!is_stalemate, "engine walked into stalemate");
    assert!(is_mate || report.mate_in.is_some());
}

#[test]
fn ladder_mate_in_two() {
    // Rook lift then back-rank mate; black's replies are forced.
    let fen = "7k/8/R7/1R6/8/8/8/K7 w - - 0 1";
    let report = search_depth(fen, 6);
    assert!(report.score >= MATE_BOUND);
    let n = report.mate_in.expect("mate distance expected");
    assert!((1..=3).contains(&n), "mate_in {} out of tolerance", n);
    assert!(report.score >= meridian::search::MATE - 2 * n - 1);
}

#[test]
fn quiescence_sees_the_hanging_queen() {
    // Stand-pat says equal; depth 1 plus quiescence must cash the queen.
    let fen = "r3k2r/8/8/4q3/4Q3/8/8/R3K2R w KQkq - 0 1";
    let report = search_depth(fen, 1);
    assert!(
        report.score >= 500,
        "horizon missed the queen capture: {}",
        report.score
    );
    assert_eq!(report.best.unwrap().to_uci(), "e4e5");
}

#[test]
fn threefold_shuffle_scores_as_draw() {
    let mut pos = Position::startpos();
    for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
        let mut moves = Vec::new();
        generate_legal(&mut pos, &mut moves);
        let mv = *moves.iter().find(|m| m.to_uci() == uci).unwrap();
        pos.make(mv);
    }
    assert!(pos.is_threefold());

    let mut engine = Engine::new();
    engine.pos = pos;
    let limits = SearchLimits {
        depth: Some(4),
        ..Default::default()
    };
    let report = engine.search(&limits, &SearchClock::infinite(), &mut |_| {});
    assert!(
        report.score.abs() <= 100,
        "shuffled opening should stay near the draw score, got {}",
        report.score
    );
}

#[test]
fn fifty_move_rule_flattens_the_score() {
    // White is a rook up, but the clock sits at 99: every quiet move
    // completes the hundredth half-move.
    let fen = "8/8/8/4k3/8/8/4K3/R7 w - - 99 80";
    let report = search_depth(fen, 4);
    assert!(
        report.score.abs() <= 20,
        "fifty-move draw not reflected: {}",
        report.score
    );
}

#[test]
fn tactical_position_converges_through_aspiration() {
    // The queen falls at shallow depth; deeper iterations re-anchor the
    // aspiration window several hundred centipawns away.
    let fen = "k7/8/8/3q4/8/8/3R4/K7 w - - 0 1";
    let report = search_depth(fen, 7);
    assert!(report.score >= 300, "rook must win the queen: {}", report.score);
    assert_eq!(report.best.unwrap().to_uci(), "d2d5");
    assert!(!report.pv.is_empty());
}

#[test]
fn deepening_scores_do_not_collapse() {
    // Iterative deepening on a quiet position: each depth's score stays
    // within a window of the previous one (no pathological swings).
    let mut prev: Option<i32> = None;
    for depth in 1..=5 {
        let report = search_depth(
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
            depth,
        );
        if let Some(p) = prev {
            assert!(
                report.score >= p - 200,
                "depth {} score {} fell off a cliff from {}",
                depth,
                report.score,
                p
            );
        }
        prev = Some(report.score);
    }
}

#[test]
fn insufficient_material_is_drawn() {
    // Bare kings plus a knight: nothing to play for.
    let report = search_depth("8/8/4k3/8/8/3KN3/8/8 w - - 0 1", 6);
    assert!(report.score.abs() <= 20, "dead draw scored {}", report.score);
}

#[test]
fn reports_a_ponder_move_from_the_pv() {
    let report = search_depth(
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
        5,
    );
    if report.pv.len() >= 2 {
        assert_eq!(report.ponder, Some(report.pv[1]));
    }
}
