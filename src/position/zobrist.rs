use crate::bitboard::{FILE_A, FILE_H};
use crate::position::{CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ, Piece, Position, Side};
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

#[cfg(feature = "deterministic_zobrist")]
const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct ZobristKeys {
    /// `[side][piece][square]` with {Black = 0, White = 1}.
    pub piece: [[[u64; 64]; 6]; 2],
    /// XORed in when Black is to move.
    pub side_to_move: u64,
    /// K, Q, k, q bit order.
    pub castling: [u64; 4],
    /// Files a..h.
    pub ep_file: [u64; 8],
}

pub fn keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate_keys(make_rng()))
}

fn make_rng() -> StdRng {
    #[cfg(feature = "deterministic_zobrist")]
    {
        StdRng::seed_from_u64(ZOBRIST_SEED)
    }
    #[cfg(not(feature = "deterministic_zobrist"))]
    {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        StdRng::from_seed(seed)
    }
}

fn generate_keys(mut rng: StdRng) -> ZobristKeys {
    // Zero keys would make distinct features cancel silently.
    let mut non_zero = || loop {
        let v = rng.next_u64();
        if v != 0 {
            return v;
        }
    };

    let mut keys = ZobristKeys {
        piece: [[[0; 64]; 6]; 2],
        side_to_move: 0,
        castling: [0; 4],
        ep_file: [0; 8],
    };
    for side in 0..2 {
        for piece in 0..6 {
            for sq in 0..64 {
                keys.piece[side][piece][sq] = non_zero();
            }
        }
    }
    for k in keys.castling.iter_mut() {
        *k = non_zero();
    }
    for k in keys.ep_file.iter_mut() {
        *k = non_zero();
    }
    keys.side_to_move = non_zero();
    keys
}

/// Combined castling contribution for a rights bitfield.
#[inline]
pub fn castling_hash(keys: &ZobristKeys, rights: u8) -> u64 {
    let mut hash = 0;
    if rights & CASTLE_WK != 0 {
        hash ^= keys.castling[0];
    }
    if rights & CASTLE_WQ != 0 {
        hash ^= keys.castling[1];
    }
    if rights & CASTLE_BK != 0 {
        hash ^= keys.castling[2];
    }
    if rights & CASTLE_BQ != 0 {
        hash ^= keys.castling[3];
    }
    hash
}

/// XORs the hash delta for a rights transition `old -> new`.
#[inline]
pub fn xor_castling_delta(hash: &mut u64, keys: &ZobristKeys, old: u8, new: u8) {
    *hash ^= castling_hash(keys, old ^ new);
}

/// The en-passant file enters the key only when the side to move has a
/// pawn that could actually capture onto the target square (pins
/// ignored). Keeps transpositions with a dead en-passant square equal,
/// which the repetition rule depends on.
pub fn ep_file_to_hash(pos: &Position) -> Option<u8> {
    let ep = pos.en_passant?;
    let idx = ep.index();
    let rank = idx / 8;
    if rank != 2 && rank != 5 {
        return None;
    }

    let target = 1u64 << idx;
    let capturers = match pos.side_to_move {
        Side::White => ((target & !FILE_H) >> 7) | ((target & !FILE_A) >> 9),
        Side::Black => ((target & !FILE_A) << 7) | ((target & !FILE_H) << 9),
    };
    if capturers & pos.bb(pos.side_to_move, Piece::Pawn) != 0 {
        Some(idx % 8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn keys_are_distinct_and_non_zero() {
        let k = keys();
        assert_ne!(k.side_to_move, 0);
        for f in 0..8 {
            assert_ne!(k.ep_file[f], 0);
        }
        assert_ne!(k.piece[0][0][0], k.piece[1][0][0]);
    }

    #[test]
    fn castling_delta_is_symmetric() {
        let k = keys();
        let mut h = 0u64;
        xor_castling_delta(&mut h, k, 0b1111, 0b0101);
        xor_castling_delta(&mut h, k, 0b0101, 0b1111);
        assert_eq!(h, 0);
    }

    #[test]
    fn dead_ep_square_does_not_hash() {
        // Black just double-pushed h7h5 but no white pawn can capture.
        let pos = Position::from_str(
            "rnbqkbnr/ppppppp1/8/7p/8/8/PPPPPPPP/RNBQKBNR w KQkq h6 0 2",
        )
        .unwrap();
        assert_eq!(ep_file_to_hash(&pos), None);
    }

    #[test]
    fn live_ep_square_hashes_its_file() {
        // White pawn on g5 can take h5 en passant.
        let pos = Position::from_str(
            "rnbqkbnr/ppppppp1/8/6Pp/8/8/PPPPPP1P/RNBQKBNR w KQkq h6 0 3",
        )
        .unwrap();
        assert_eq!(ep_file_to_hash(&pos), Some(7));
    }
}
