//! Make/unmake round-trip and zobrist-parity properties, exercised over
//! exhaustive shallow walks and long pseudo-random game walks.

use meridian::movegen::{Move, generate_legal};
use meridian::position::Position;
use std::str::FromStr;

/// Walks every legal line to `depth`, checking bit-exact restoration
/// and incremental-key parity at every node.
fn verify_walk(pos: &mut Position, depth: u32) {
    if depth == 0 {
        return;
    }
    let snapshot = pos.clone();
    let mut moves = Vec::new();
    generate_legal(pos, &mut moves);

    for mv in moves {
        let (undo, legal) = pos.make(mv);
        assert!(legal);
        assert_eq!(
            pos.zobrist,
            pos.compute_zobrist(),
            "incremental key diverged after {}",
            mv
        );
        verify_walk(pos, depth - 1);
        pos.unmake(mv, undo);
        assert_eq!(*pos, snapshot, "unmake failed to restore after {}", mv);
    }
}

#[test]
fn exhaustive_round_trip_from_startpos() {
    let mut pos = Position::startpos();
    verify_walk(&mut pos, 3);
}

#[test]
fn exhaustive_round_trip_tactical_position() {
    let mut pos =
        Position::from_str("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    verify_walk(&mut pos, 2);
}

#[test]
fn exhaustive_round_trip_endgame() {
    let mut pos = Position::from_str("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    verify_walk(&mut pos, 3);
}

/// Long random games: positions stacked up and unwound in reverse must
/// restore the exact starting state, zobrist included.
#[test]
fn deep_walk_unwinds_to_start() {
    // Small deterministic LCG; no external randomness in tests.
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % bound
    };

    for _ in 0..20 {
        let mut pos = Position::startpos();
        let initial = pos.clone();
        let mut trail: Vec<(Move, meridian::position::Undo)> = Vec::new();

        for _ in 0..60 {
            let mut moves = Vec::new();
            generate_legal(&mut pos, &mut moves);
            if moves.is_empty() {
                break;
            }
            let mv = moves[next(moves.len())];
            let (undo, legal) = pos.make(mv);
            assert!(legal);
            trail.push((mv, undo));
        }

        assert_eq!(pos.zobrist, pos.compute_zobrist());
        for (mv, undo) in trail.into_iter().rev() {
            pos.unmake(mv, undo);
        }
        assert_eq!(pos, initial);
    }
}

#[test]
fn fen_export_stable_under_round_trip() {
    let fens = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
        "8/P6k/8/8/8/8/p6K/8 w - - 0 1",
    ];
    for fen in fens {
        let mut pos = Position::from_str(fen).unwrap();
        let mut moves = Vec::new();
        generate_legal(&mut pos, &mut moves);
        for mv in moves {
            let (undo, legal) = pos.make(mv);
            if legal {
                // The emitted FEN must parse back to the same state.
                let reparsed = Position::from_str(&pos.to_fen()).unwrap();
                assert_eq!(reparsed.zobrist, pos.compute_zobrist());
            }
            pos.unmake(mv, undo);
        }
        assert_eq!(pos.to_fen(), fen);
    }
}
