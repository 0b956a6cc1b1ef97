//! Static evaluation. Centipawn score from the side-to-move's viewpoint:
//! a cached lazy core (material + piece-square tables) with alpha/beta
//! early-outs, then per-piece middlegame/endgame terms blended by the
//! material phase.

pub mod cache;
pub mod psqt;

pub use cache::EvalCache;

use crate::attacks::{self, KING_ATTACKS, KNIGHT_ATTACKS, pawn_attacks};
use crate::bitboard::{BitboardExt, FILE_A, FILE_H, file_bb, file_fill, lines, pop_lsb};
use crate::position::{ALL_PIECES, Piece, Position, Side};

/// Side-to-move bonus, deliberately asymmetric.
pub const TEMPO: i32 = 5;

/// Skip the positional terms when the lazy core is already this far
/// outside the window.
const LAZY_MARGIN: i32 = 250;

// --- pawns ---
const PAWN_CENTER_BONUS: (i32, i32) = (12, 4);
const PAWN_SEVENTH_BONUS: (i32, i32) = (24, 48);
const PASSED_PAWN_BONUS: [i32; 8] = [0, 8, 16, 28, 48, 90, 150, 0];
const PASSED_UNSTOPPABLE_BONUS: i32 = 40;
const ISOLATED_PENALTY: (i32, i32) = (-13, -16);
const DOUBLED_PENALTY: (i32, i32) = (-9, -12);
const BACKWARD_PENALTY: (i32, i32) = (-8, -10);
const UNPROTECTED_PENALTY: (i32, i32) = (-4, -2);
const PAWN_KING_ATTACK_BONUS: (i32, i32) = (10, 4);

// --- knights ---
const KNIGHT_MOBILITY: [i32; 9] = [-28, -14, -6, 0, 5, 9, 12, 15, 17];
const KNIGHT_UNDEVELOPED_PENALTY: i32 = -10;
const KNIGHT_TRAPPED_PENALTY: (i32, i32) = (-60, -40);
const OUTPOST_BONUS: (i32, i32) = (22, 12);

// --- bishops ---
const BISHOP_PAIR_BONUS: (i32, i32) = (28, 44);
const BISHOP_MOBILITY_WEIGHT: (i32, i32) = (4, 4);
const BISHOP_LONG_DIAGONAL_BONUS: (i32, i32) = (16, 8);
const BISHOP_OWN_PAWN_COLOR_PENALTY: (i32, i32) = (-3, -5);

// --- rooks ---
const ROOK_SEVENTH_BONUS: (i32, i32) = (18, 26);
const ROOK_OPEN_FILE_BONUS: (i32, i32) = (22, 12);
const ROOK_SEMI_OPEN_FILE_BONUS: (i32, i32) = (10, 8);
const ROOK_CONNECTED_BONUS: (i32, i32) = (8, 4);
const ROOK_MOBILITY_WEIGHT: (i32, i32) = (2, 4);
const ROOK_TRAPPED_BY_KING_PENALTY: (i32, i32) = (-40, -10);
const ROOK_BLOCKED_PENALTY: (i32, i32) = (-10, -4);

// --- queens ---
const QUEEN_MOBILITY_WEIGHT: (i32, i32) = (1, 3);
const QUEEN_OPEN_FILE_BONUS: (i32, i32) = (8, 6);
const QUEEN_SEMI_OPEN_FILE_BONUS: (i32, i32) = (4, 3);
const QUEEN_BISHOP_DIAGONAL_BONUS: (i32, i32) = (8, 4);

// --- kings ---
const KING_SHIELD_BONUS: i32 = 14;
const KING_OPEN_FILE_PENALTY: i32 = -28;
const KING_ZONE_ATTACK_PENALTY: i32 = 12;
const KING_MOBILITY_EG_WEIGHT: i32 = 3;

// --- castling ability proxy ---
const CASTLE_RIGHT_BONUS: i32 = 8;

const CENTER_MASK: u64 = (1 << 27) | (1 << 28) | (1 << 35) | (1 << 36); // d4 e4 d5 e5
const LONG_DIAGONALS: u64 = 0x8040_2010_0804_0201 | 0x0102_0408_1020_4080;

#[derive(Default, Clone, Copy)]
struct Pair {
    mg: i32,
    eg: i32,
}

impl Pair {
    #[inline(always)]
    fn add(&mut self, bonus: (i32, i32)) {
        self.mg += bonus.0;
        self.eg += bonus.1;
    }

    #[inline(always)]
    fn add_scaled(&mut self, bonus: (i32, i32), n: i32) {
        self.mg += bonus.0 * n;
        self.eg += bonus.1 * n;
    }
}

/// Game phase in [0, 256]; 0 is the full middlegame, 256 a bare endgame.
pub fn phase(pos: &Position) -> i32 {
    let count = |p: Piece| {
        (pos.bb(Side::White, p).count() + pos.bb(Side::Black, p).count()) as i32
    };
    let npm = count(Piece::Knight) * psqt::KNIGHT_PHASE
        + count(Piece::Bishop) * psqt::BISHOP_PHASE
        + count(Piece::Rook) * psqt::ROOK_PHASE
        + count(Piece::Queen) * psqt::QUEEN_PHASE;
    let remaining = npm.clamp(0, psqt::TOTAL_PHASE);
    (psqt::TOTAL_PHASE - remaining) * 256 / psqt::TOTAL_PHASE
}

#[inline(always)]
fn blend(mg: i32, eg: i32, phase: i32) -> i32 {
    (mg * (256 - phase) + eg * phase) / 256
}

fn material_psqt(pos: &Position) -> Pair {
    let mut total = Pair::default();
    for piece in ALL_PIECES {
        let (mg_val, eg_val) = psqt::piece_value(piece);
        let (mg_tab, eg_tab) = psqt::piece_table(piece);

        let mut white = pos.bb(Side::White, piece);
        while white != 0 {
            let sq = pop_lsb(&mut white) as usize;
            total.mg += mg_val + mg_tab[sq];
            total.eg += eg_val + eg_tab[sq];
        }
        let mut black = pos.bb(Side::Black, piece);
        while black != 0 {
            let sq = pop_lsb(&mut black) as usize ^ 56;
            total.mg -= mg_val + mg_tab[sq];
            total.eg -= eg_val + eg_tab[sq];
        }
    }
    total
}

/// Tapered material + piece-square balance from the side-to-move's
/// viewpoint. This is the "lazy" value the search uses for futility
/// margins and draw-score shading.
pub fn material_balance(pos: &Position) -> i32 {
    let m = material_psqt(pos);
    let score = blend(m.mg, m.eg, phase(pos));
    match pos.side_to_move {
        Side::White => score,
        Side::Black => -score,
    }
}

/// Full static evaluation, memoized in `cache`. `alpha`/`beta` enable
/// the lazy early-out; pass an infinite window to force the full walk.
pub fn evaluate(pos: &Position, alpha: i32, beta: i32, cache: &EvalCache) -> i32 {
    if let Some(score) = cache.probe(pos.zobrist) {
        return score;
    }

    let pov = match pos.side_to_move {
        Side::White => 1,
        Side::Black => -1,
    };
    let game_phase = phase(pos);
    let material = material_psqt(pos);
    let lazy = blend(material.mg, material.eg, game_phase) * pov;

    // Lazy cut: the caller's window is so far away that the positional
    // terms cannot matter. Not cached; the full walk never ran.
    if lazy - LAZY_MARGIN >= beta || lazy + LAZY_MARGIN <= alpha {
        return lazy + TEMPO;
    }

    let white = side_terms(pos, Side::White);
    let black = side_terms(pos, Side::Black);
    let mg = material.mg + white.mg - black.mg;
    let eg = material.eg + white.eg - black.eg;

    let score = blend(mg, eg, game_phase) * pov + TEMPO;
    let clamped = score.clamp(i16::MIN as i32, i16::MAX as i32);
    cache.store(pos.zobrist, clamped as i16);
    clamped
}

/// Positional terms for one side, beyond material and PSQT.
fn side_terms(pos: &Position, side: Side) -> Pair {
    let mut total = Pair::default();
    let enemy_king_zone = king_zone(pos.king_square(side.flip()).index());

    total = pawns(pos, side, enemy_king_zone, total);
    total = knights(pos, side, total);
    total = bishops(pos, side, total);
    total = rooks(pos, side, total);
    total = queens(pos, side, total);
    total = king(pos, side, total);

    // Retained castling ability stands in for king-safety potential.
    let rights =
        pos.has_kingside_castle(side) as i32 + pos.has_queenside_castle(side) as i32;
    total.mg += rights * CASTLE_RIGHT_BONUS;

    total
}

/// The 3x3 box around a king square.
fn king_zone(king_sq: u8) -> u64 {
    let b = 1u64 << king_sq;
    let mut zone = b | ((b << 1) & !FILE_A) | ((b >> 1) & !FILE_H);
    zone |= (zone << 8) | (zone >> 8);
    zone
}

/// Ranks strictly ahead of `sq` from `side`'s viewpoint.
#[inline(always)]
fn front_ranks(side: Side, sq: usize) -> u64 {
    let rank = sq / 8;
    match side {
        Side::White => {
            if rank < 7 { !0u64 << ((rank + 1) * 8) } else { 0 }
        }
        Side::Black => {
            if rank > 0 { !0u64 >> ((8 - rank) * 8) } else { 0 }
        }
    }
}

/// File of `sq` plus its neighbors.
#[inline(always)]
fn adjacent_files(sq: usize) -> u64 {
    let file = sq % 8;
    let mut mask = file_bb(file as u8);
    if file > 0 {
        mask |= file_bb(file as u8 - 1);
    }
    if file < 7 {
        mask |= file_bb(file as u8 + 1);
    }
    mask
}

/// All squares attacked by a side's pawns.
fn pawn_attack_set(pos: &Position, side: Side) -> u64 {
    let pawns = pos.bb(side, Piece::Pawn);
    match side {
        Side::White => ((pawns & !FILE_A) << 7) | ((pawns & !FILE_H) << 9),
        Side::Black => ((pawns & !FILE_H) >> 7) | ((pawns & !FILE_A) >> 9),
    }
}

/// Outposts: reachable squares guarded by an own pawn where no enemy
/// pawn on a neighboring file can ever chase the piece away.
fn outpost_squares(pos: &Position, side: Side) -> u64 {
    let enemy_pawns = pos.bb(side.flip(), Piece::Pawn);
    let guarded = pawn_attack_set(pos, side);
    let mut safe = 0u64;
    let mut candidates = guarded;
    while candidates != 0 {
        let sq = pop_lsb(&mut candidates) as usize;
        let evictors =
            (adjacent_files(sq) & !file_bb((sq % 8) as u8)) & front_ranks(side, sq);
        if enemy_pawns & evictors == 0 {
            safe |= 1u64 << sq;
        }
    }
    safe
}

fn pawns(pos: &Position, side: Side, enemy_king_zone: u64, mut total: Pair) -> Pair {
    let us = pos.bb(side, Piece::Pawn);
    let them = pos.bb(side.flip(), Piece::Pawn);
    let own_guarded = pawn_attack_set(pos, side);
    let enemy_guarded = pawn_attack_set(pos, side.flip());
    let seventh = match side {
        Side::White => crate::bitboard::RANK_7,
        Side::Black => crate::bitboard::RANK_2,
    };

    total.add_scaled(PAWN_CENTER_BONUS, (us & CENTER_MASK).count() as i32);
    total.add_scaled(PAWN_SEVENTH_BONUS, (us & seventh).count() as i32);

    // Doubled: a same-side pawn directly behind.
    let doubled = match side {
        Side::White => us & (us << 8),
        Side::Black => us & (us >> 8),
    };
    total.add_scaled(DOUBLED_PENALTY, doubled.count() as i32);

    // Isolated: no friendly pawn on either neighboring file.
    let our_files = file_fill(us);
    let neighbor_files = ((our_files & !FILE_H) << 1) | ((our_files & !FILE_A) >> 1);
    total.add_scaled(ISOLATED_PENALTY, (us & !neighbor_files).count() as i32);

    let mut bb = us;
    while bb != 0 {
        let sq = pop_lsb(&mut bb) as usize;
        let sq_bb = 1u64 << sq;
        let rel_rank = match side {
            Side::White => sq / 8,
            Side::Black => 7 - sq / 8,
        };

        if own_guarded & sq_bb == 0 {
            total.add(UNPROTECTED_PENALTY);
        }

        // Backward: cannot be supported from behind and the stop square
        // is covered by an enemy pawn.
        let behind_support = adjacent_files(sq) & !front_ranks(side, sq) & !sq_bb;
        let stop = match side {
            Side::White => sq_bb << 8,
            Side::Black => sq_bb >> 8,
        };
        if us & behind_support == 0 && enemy_guarded & stop != 0 && neighbor_files & sq_bb != 0
        {
            total.add(BACKWARD_PENALTY);
        }

        // Passed: no enemy pawn ahead on this or a neighboring file.
        if them & adjacent_files(sq) & front_ranks(side, sq) == 0 {
            let mut bonus = PASSED_PAWN_BONUS[rel_rank];
            // Clear promotion path with the enemy king out of reach.
            let path = file_bb((sq % 8) as u8) & front_ranks(side, sq);
            let promo_sq = match side {
                Side::White => sq % 8 + 56,
                Side::Black => sq % 8,
            };
            let enemy_king = pos.king_square(side.flip()).index() as usize;
            let king_dist = lines().distance[enemy_king][promo_sq] as usize;
            let pawn_dist = 7 - rel_rank;
            if path & pos.occupied() == 0 && pawn_dist < king_dist {
                bonus += PASSED_UNSTOPPABLE_BONUS;
            }
            total.mg += bonus / 2;
            total.eg += bonus;
        }

        if pawn_attacks(sq as u8, side) & enemy_king_zone != 0 {
            total.add(PAWN_KING_ATTACK_BONUS);
        }
    }

    total
}

fn knights(pos: &Position, side: Side, mut total: Pair) -> Pair {
    let us = pos.occupancy(side);
    let outposts = outpost_squares(pos, side);
    let home_rank_squares = match side {
        Side::Black => (1u64 << 57) | (1u64 << 62),
        Side::White => (1u64 << 1) | (1u64 << 6),
    };
    let corners = match side {
        Side::White => (1u64 << 56) | (1u64 << 63), // a8/h8 traps
        Side::Black => 1u64 | (1u64 << 7),
    };

    let mut bb = pos.bb(side, Piece::Knight);
    total.mg += (bb & home_rank_squares).count() as i32 * KNIGHT_UNDEVELOPED_PENALTY;
    total.add_scaled(KNIGHT_TRAPPED_PENALTY, (bb & corners).count() as i32);

    while bb != 0 {
        let sq = pop_lsb(&mut bb) as usize;
        let moves = (KNIGHT_ATTACKS[sq] & !us).count() as usize;
        total.mg += KNIGHT_MOBILITY[moves];
        total.eg += KNIGHT_MOBILITY[moves];
        if outposts & (1u64 << sq) != 0 {
            total.add(OUTPOST_BONUS);
        }
    }
    total
}

fn bishops(pos: &Position, side: Side, mut total: Pair) -> Pair {
    let tables = attacks::tables();
    let us = pos.occupancy(side);
    let occupied = pos.occupied();
    let own_pawns = pos.bb(side, Piece::Pawn);
    let outposts = outpost_squares(pos, side);

    let bb_all = pos.bb(side, Piece::Bishop);
    if bb_all.count() >= 2 {
        total.add(BISHOP_PAIR_BONUS);
    }

    let mut bb = bb_all;
    while bb != 0 {
        let sq = pop_lsb(&mut bb) as usize;
        let sq_bb = 1u64 << sq;
        let moves = (tables.bishop.get(sq, occupied) & !us).count() as i32;
        total.add_scaled(BISHOP_MOBILITY_WEIGHT, moves);

        if sq_bb & LONG_DIAGONALS != 0 {
            total.add(BISHOP_LONG_DIAGONAL_BONUS);
        }
        if outposts & sq_bb != 0 {
            total.add(OUTPOST_BONUS);
        }

        // A lone bishop suffers for every own pawn fixed on its color.
        if bb_all.count() == 1 {
            const LIGHT_SQUARES: u64 = 0x55AA_55AA_55AA_55AA;
            let same_color = if sq_bb & LIGHT_SQUARES != 0 {
                own_pawns & LIGHT_SQUARES
            } else {
                own_pawns & !LIGHT_SQUARES
            };
            total.add_scaled(BISHOP_OWN_PAWN_COLOR_PENALTY, same_color.count() as i32);
        }
    }
    total
}

fn rooks(pos: &Position, side: Side, mut total: Pair) -> Pair {
    let tables = attacks::tables();
    let us = pos.occupancy(side);
    let occupied = pos.occupied();
    let own_pawns = pos.bb(side, Piece::Pawn);
    let enemy_pawns = pos.bb(side.flip(), Piece::Pawn);
    let king_sq = pos.king_square(side).index() as usize;
    let seventh = match side {
        Side::White => crate::bitboard::RANK_7,
        Side::Black => crate::bitboard::RANK_2,
    };

    let all_rooks = pos.bb(side, Piece::Rook);
    let mut bb = all_rooks;
    while bb != 0 {
        let sq = pop_lsb(&mut bb) as usize;
        let sq_bb = 1u64 << sq;
        let file = file_bb((sq % 8) as u8);

        if sq_bb & seventh != 0 {
            total.add(ROOK_SEVENTH_BONUS);
        }
        if file & own_pawns == 0 {
            if file & enemy_pawns == 0 {
                total.add(ROOK_OPEN_FILE_BONUS);
            } else {
                total.add(ROOK_SEMI_OPEN_FILE_BONUS);
            }
        }

        let attacks_bb = tables.rook.get(sq, occupied);
        let moves = (attacks_bb & !us).count() as i32;
        total.add_scaled(ROOK_MOBILITY_WEIGHT, moves);

        // Boxed in beside an uncastled king in the corner.
        let same_rank = sq / 8 == king_sq / 8;
        if same_rank && moves <= 3 {
            let king_file = king_sq % 8;
            let rook_file = sq % 8;
            let cornered = (king_file >= 4 && rook_file > king_file)
                || (king_file <= 3 && rook_file < king_file);
            if cornered {
                total.add(ROOK_TRAPPED_BY_KING_PENALTY);
            }
        }

        // No horizontal freedom at all.
        let rank_mask = crate::bitboard::rank_bb((sq / 8) as u8);
        if attacks_bb & rank_mask & !pos.occupied() == 0 {
            total.add(ROOK_BLOCKED_PENALTY);
        }

        if attacks_bb & all_rooks & !sq_bb != 0 {
            total.add(ROOK_CONNECTED_BONUS);
        }
    }
    total
}

fn queens(pos: &Position, side: Side, mut total: Pair) -> Pair {
    let tables = attacks::tables();
    let us = pos.occupancy(side);
    let occupied = pos.occupied();
    let own_pawns = pos.bb(side, Piece::Pawn);
    let enemy_pawns = pos.bb(side.flip(), Piece::Pawn);
    let own_bishops = pos.bb(side, Piece::Bishop);
    let geometry = lines();

    let mut bb = pos.bb(side, Piece::Queen);
    while bb != 0 {
        let sq = pop_lsb(&mut bb) as usize;
        let file = file_bb((sq % 8) as u8);

        let moves = (tables.queen(sq, occupied) & !us).count() as i32;
        total.add_scaled(QUEEN_MOBILITY_WEIGHT, moves);

        if file & own_pawns == 0 {
            if file & enemy_pawns == 0 {
                total.add(QUEEN_OPEN_FILE_BONUS);
            } else {
                total.add(QUEEN_SEMI_OPEN_FILE_BONUS);
            }
        }

        let diagonals = geometry.diagonal[sq] | geometry.antidiagonal[sq];
        if diagonals & own_bishops != 0 {
            total.add(QUEEN_BISHOP_DIAGONAL_BONUS);
        }
    }
    total
}

fn king(pos: &Position, side: Side, mut total: Pair) -> Pair {
    let king_sq = pos.king_square(side).index() as usize;
    let us = pos.occupancy(side);
    let own_pawns = pos.bb(side, Piece::Pawn);

    // Pawn shield on the three files around the king, one rank ahead.
    let shield_rank = match side {
        Side::White => king_sq / 8 + 1,
        Side::Black => (king_sq / 8).wrapping_sub(1),
    };
    if shield_rank < 8 {
        let shield =
            adjacent_files(king_sq) & crate::bitboard::rank_bb(shield_rank as u8) & own_pawns;
        let count = shield.count() as i32;
        total.mg += count * KING_SHIELD_BONUS;
        if count == 0 {
            total.mg += KING_OPEN_FILE_PENALTY;
        }
    }

    // Open file straight at the king.
    if file_bb((king_sq % 8) as u8) & own_pawns == 0 {
        total.mg += KING_OPEN_FILE_PENALTY / 2;
    }

    // Attackers touching the 3x3 zone, weighted toward the middlegame.
    let attackers = count_zone_attackers(pos, side.flip(), king_zone(king_sq as u8));
    total.mg -= attackers * KING_ZONE_ATTACK_PENALTY;

    // Endgame terms: centralization comes from the PSQT; add freedom.
    let safe_moves = (KING_ATTACKS[king_sq] & !us).count() as i32;
    total.eg += safe_moves * KING_MOBILITY_EG_WEIGHT;

    total
}

fn count_zone_attackers(pos: &Position, attacker: Side, zone: u64) -> i32 {
    let tables = attacks::tables();
    let occupied = pos.occupied();
    let mut count = 0;

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        let mut bb = pos.bb(attacker, piece);
        while bb != 0 {
            let sq = pop_lsb(&mut bb) as usize;
            let hits = match piece {
                Piece::Knight => KNIGHT_ATTACKS[sq],
                Piece::Bishop => tables.bishop.get(sq, occupied),
                Piece::Rook => tables.rook.get(sq, occupied),
                Piece::Queen => tables.queen(sq, occupied),
                _ => 0,
            };
            if hits & zone != 0 {
                count += 1;
            }
        }
    }
    count
}
