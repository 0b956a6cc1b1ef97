//! Forsyth-Edwards notation load/export.

use crate::position::{
    CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ, Piece, Position, Side,
};
use crate::square::Square;

pub(crate) const START_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// O(1) glyph -> (side, piece) map; uppercase is White.
const GLYPH_TO_SP: [Option<(Side, Piece)>; 128] = {
    let mut t: [Option<(Side, Piece)>; 128] = [None; 128];
    t['P' as usize] = Some((Side::White, Piece::Pawn));
    t['N' as usize] = Some((Side::White, Piece::Knight));
    t['B' as usize] = Some((Side::White, Piece::Bishop));
    t['R' as usize] = Some((Side::White, Piece::Rook));
    t['Q' as usize] = Some((Side::White, Piece::Queen));
    t['K' as usize] = Some((Side::White, Piece::King));
    t['p' as usize] = Some((Side::Black, Piece::Pawn));
    t['n' as usize] = Some((Side::Black, Piece::Knight));
    t['b' as usize] = Some((Side::Black, Piece::Bishop));
    t['r' as usize] = Some((Side::Black, Piece::Rook));
    t['q' as usize] = Some((Side::Black, Piece::Queen));
    t['k' as usize] = Some((Side::Black, Piece::King));
    t
};

pub(crate) fn piece_glyph(side: Side, piece: Piece) -> char {
    const WHITE: [char; 6] = ['P', 'N', 'B', 'R', 'Q', 'K'];
    const BLACK: [char; 6] = ['p', 'n', 'b', 'r', 'q', 'k'];
    match side {
        Side::White => WHITE[piece as usize],
        Side::Black => BLACK[piece as usize],
    }
}

impl Position {
    /// Replaces the whole state from a FEN string. On error the position
    /// is left unspecified; callers keep their prior copy (the command
    /// boundary parses into a scratch position first).
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or("empty FEN")?;
        let side = fields.next().ok_or("FEN missing side to move")?;
        let castling = fields.next().unwrap_or("-");
        let en_passant = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        *self = Position::empty();

        // Piece placement, rank 8 first.
        let mut rank: i32 = 7;
        let mut file: i32 = 0;
        for c in placement.chars() {
            match c {
                '/' => {
                    if file != 8 {
                        return Err(format!("short rank in FEN: {:?}", placement));
                    }
                    rank -= 1;
                    file = 0;
                    if rank < 0 {
                        return Err("too many ranks in FEN".into());
                    }
                }
                '1'..='8' => {
                    file += c as i32 - '0' as i32;
                    if file > 8 {
                        return Err(format!("rank overflow in FEN: {:?}", placement));
                    }
                }
                _ => {
                    let (s, p) = GLYPH_TO_SP
                        .get(c as usize)
                        .copied()
                        .flatten()
                        .ok_or_else(|| format!("bad piece glyph: {:?}", c))?;
                    if file > 7 {
                        return Err(format!("rank overflow in FEN: {:?}", placement));
                    }
                    let sq = Square::from_coords(file as u8, rank as u8);
                    self.set_bb(s, p, self.bb(s, p) | sq.bb());
                    file += 1;
                }
            }
        }
        if rank != 0 || file != 8 {
            return Err(format!("incomplete placement: {:?}", placement));
        }

        self.side_to_move = match side {
            "w" => Side::White,
            "b" => Side::Black,
            _ => return Err(format!("bad side to move: {:?}", side)),
        };

        self.castling = 0;
        if castling != "-" {
            for c in castling.chars() {
                self.castling |= match c {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    _ => return Err(format!("bad castling field: {:?}", castling)),
                };
            }
        }

        self.en_passant = if en_passant == "-" {
            None
        } else {
            let sq: Square = en_passant
                .parse()
                .map_err(|e| format!("bad en-passant field: {}", e))?;
            if sq.rank() != 2 && sq.rank() != 5 {
                return Err(format!("en-passant square off rank 3/6: {}", sq));
            }
            Some(sq)
        };

        self.halfmove_clock = halfmove
            .parse()
            .map_err(|_| format!("bad halfmove clock: {:?}", halfmove))?;
        self.fullmove_number = fullmove
            .parse()
            .map_err(|_| format!("bad fullmove number: {:?}", fullmove))?;

        self.ring_clear();
        self.zobrist = self.compute_zobrist();
        self.validate()?;
        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);

        for rank in (0..8).rev() {
            let mut run = 0;
            for file in 0..8 {
                match self.piece_at(Square::from_coords(file, rank)) {
                    Some((side, piece)) => {
                        if run > 0 {
                            out.push((b'0' + run) as char);
                            run = 0;
                        }
                        out.push(piece_glyph(side, piece));
                    }
                    None => run += 1,
                }
            }
            if run > 0 {
                out.push((b'0' + run) as char);
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match self.side_to_move {
            Side::White => 'w',
            Side::Black => 'b',
        });

        out.push(' ');
        if self.castling == 0 {
            out.push('-');
        } else {
            if self.castling & CASTLE_WK != 0 {
                out.push('K');
            }
            if self.castling & CASTLE_WQ != 0 {
                out.push('Q');
            }
            if self.castling & CASTLE_BK != 0 {
                out.push('k');
            }
            if self.castling & CASTLE_BQ != 0 {
                out.push('q');
            }
        }

        out.push(' ');
        match self.en_passant {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn start_fen_round_trips() {
        let p = Position::from_str(START_FEN).unwrap();
        assert_eq!(p.to_fen(), START_FEN);
    }

    #[test]
    fn corpus_round_trips() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "4k3/8/4K3/8/8/8/8/6Q1 w - - 0 1",
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2",
        ] {
            let p = Position::from_str(fen).unwrap();
            assert_eq!(p.to_fen(), fen, "round trip failed for {}", fen);
            p.validate().unwrap();
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Position::from_str("").is_err());
        assert!(Position::from_str("rnbqkbnr/pppppppp w KQkq - 0 1").is_err());
        assert!(Position::from_str("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Position::from_str("xnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
        // en passant on a nonsense rank
        assert!(
            Position::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e4 0 1")
                .is_err()
        );
        // two kings of one color
        assert!(Position::from_str("4k3/8/8/8/8/8/8/2K1K3 w - - 0 1").is_err());
    }
}
