//! Magic-multiply sliding attack tables.
//!
//! For each square we precompute a vision mask (relevant blockers, board
//! edges excluded), a magic multiplier hashing every blocker subset to a
//! dense index, and the attack table those indices point into. Lookup is
//! mask, multiply, shift, load.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fixed seed: tables are identical across runs and threads.
const MAGIC_SEED: u64 = 0xD6E5_1C3A_9F24_7B01;

const MAGIC_ATTEMPTS: u32 = 1_000_000;

/// One square's magic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicSquare {
    pub magic: u64,
    pub shift: u32,
    pub mask: u64,
    pub table: Box<[u64]>,
}

impl MagicSquare {
    #[inline(always)]
    fn index(&self, blockers: u64) -> usize {
        (((blockers & self.mask).wrapping_mul(self.magic)) >> self.shift) as usize
    }
}

/// Per-square magic entries for one slider kind.
#[derive(Debug, Serialize, Deserialize)]
pub struct SliderAttacks {
    entries: Vec<MagicSquare>,
}

impl SliderAttacks {
    #[inline(always)]
    pub fn get(&self, square: usize, blockers: u64) -> u64 {
        let entry = &self.entries[square];
        entry.table[entry.index(blockers)]
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttackTables {
    pub rook: SliderAttacks,
    pub bishop: SliderAttacks,
}

impl AttackTables {
    #[inline(always)]
    pub fn queen(&self, square: usize, blockers: u64) -> u64 {
        self.rook.get(square, blockers) | self.bishop.get(square, blockers)
    }

    pub fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
        AttackTables {
            rook: build_slider(rook_mask, rook_rays, &mut rng),
            bishop: build_slider(bishop_mask, bishop_rays, &mut rng),
        }
    }
}

/// Scan-based reference generator. Slow; used to seed the tables and as
/// the oracle in tests.
pub fn rook_rays(square: usize, blockers: u64) -> u64 {
    scan_rays(square, blockers, &[(1, 0), (-1, 0), (0, 1), (0, -1)])
}

pub fn bishop_rays(square: usize, blockers: u64) -> u64 {
    scan_rays(square, blockers, &[(1, 1), (1, -1), (-1, 1), (-1, -1)])
}

fn scan_rays(square: usize, blockers: u64, dirs: &[(i32, i32)]) -> u64 {
    let (rank, file) = ((square / 8) as i32, (square % 8) as i32);
    let mut attacks = 0u64;
    for &(dr, df) in dirs {
        let (mut r, mut f) = (rank + dr, file + df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let sq = (r * 8 + f) as u64;
            attacks |= 1 << sq;
            if (blockers >> sq) & 1 != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// Relevant-blocker mask: ray squares with the board edge stripped off
/// (an edge square blocks nothing beyond it).
fn rook_mask(square: usize) -> u64 {
    let (rank, file) = (square / 8, square % 8);
    let mut mask = 0u64;
    for r in (rank + 1)..7 {
        mask |= 1 << (r * 8 + file);
    }
    for r in 1..rank {
        mask |= 1 << (r * 8 + file);
    }
    for f in (file + 1)..7 {
        mask |= 1 << (rank * 8 + f);
    }
    for f in 1..file {
        mask |= 1 << (rank * 8 + f);
    }
    mask
}

fn bishop_mask(square: usize) -> u64 {
    let (rank, file) = ((square / 8) as i32, (square % 8) as i32);
    let mut mask = 0u64;
    for &(dr, df) in &[(1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let (mut r, mut f) = (rank + dr, file + df);
        while (1..7).contains(&r) && (1..7).contains(&f) {
            mask |= 1 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

/// Enumerates every subset of `mask` (carry-rippler walk).
fn blocker_subsets(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1 << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
    subsets
}

/// Sparse candidates collide less often when hashed into the table.
#[inline(always)]
fn random_sparse_u64<R: RngCore>(rng: &mut R) -> u64 {
    rng.next_u64() & rng.next_u64() & rng.next_u64()
}

fn find_magic<R: RngCore>(
    blockers: &[u64],
    attacks: &[u64],
    shift: u32,
    rng: &mut R,
) -> (u64, Box<[u64]>) {
    let size = 1usize << (64 - shift);
    let mut table = vec![0u64; size];
    let mut stamp = vec![0u32; size];

    for attempt in 1..=MAGIC_ATTEMPTS {
        let magic = random_sparse_u64(rng);
        // Weed out candidates that do not spread the high bits at all.
        if (blockers[blockers.len() - 1].wrapping_mul(magic) >> 56).count_ones() < 3 {
            continue;
        }

        let mut ok = true;
        for (&blocker, &attack) in blockers.iter().zip(attacks) {
            let idx = (blocker.wrapping_mul(magic) >> shift) as usize;
            if stamp[idx] != attempt {
                stamp[idx] = attempt;
                table[idx] = attack;
            } else if table[idx] != attack {
                ok = false;
                break;
            }
        }
        if ok {
            // Zero the slots this candidate never touched.
            for i in 0..size {
                if stamp[i] != attempt {
                    table[i] = 0;
                }
            }
            return (magic, table.into_boxed_slice());
        }
    }
    // A fixed seed that has produced tables before cannot run dry; this
    // is unreachable short of memory corruption.
    panic!("no magic number found after {} attempts", MAGIC_ATTEMPTS);
}

fn build_slider<R: RngCore>(
    mask_fn: fn(usize) -> u64,
    rays_fn: fn(usize, u64) -> u64,
    rng: &mut R,
) -> SliderAttacks {
    let mut entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = mask_fn(square);
        let shift = 64 - mask.count_ones();
        let blockers = blocker_subsets(mask);
        let attacks: Vec<u64> = blockers.iter().map(|&b| rays_fn(square, b)).collect();
        let (magic, table) = find_magic(&blockers, &attacks, shift, rng);
        entries.push(MagicSquare {
            magic,
            shift,
            mask,
            table,
        });
    }
    SliderAttacks { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn masks_exclude_edges() {
        // d4 rook mask: 10 relevant squares (6 vertical + 4 horizontal)
        assert_eq!(rook_mask(27).count_ones(), 10);
        // corner rook mask: 12 relevant squares
        assert_eq!(rook_mask(0).count_ones(), 12);
        assert_eq!(bishop_mask(27).count_ones(), 9);
        assert_eq!(bishop_mask(0).count_ones(), 6);
    }

    #[test]
    fn subsets_cover_power_set() {
        let mask = (1u64 << 3) | (1u64 << 17) | (1u64 << 40);
        let subsets = blocker_subsets(mask);
        assert_eq!(subsets.len(), 8);
        for s in &subsets {
            assert_eq!(s & !mask, 0);
        }
    }

    #[test]
    fn magic_lookup_matches_scan_on_random_occupancies() {
        let tables = AttackTables::generate();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let occ: u64 = rng.random::<u64>() & rng.random::<u64>();
            for square in [0usize, 7, 27, 36, 56, 63] {
                assert_eq!(tables.rook.get(square, occ), rook_rays(square, occ));
                assert_eq!(tables.bishop.get(square, occ), bishop_rays(square, occ));
                assert_eq!(
                    tables.queen(square, occ),
                    rook_rays(square, occ) | bishop_rays(square, occ)
                );
            }
        }
    }
}
