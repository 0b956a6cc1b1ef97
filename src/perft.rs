//! Perft node counting. Debug utility for validating move generation
//! and make/unmake against the published reference counts.

use crate::movegen::{Move, generate_all};
use crate::position::Position;
use tracing::{debug, instrument};

const MAX_PERFT_DEPTH: usize = 16;

fn perft_inner(
    pos: &mut Position,
    depth: u32,
    ply: usize,
    buffers: &mut [Vec<Move>],
) -> u64 {
    if depth == 0 {
        return 1;
    }

    {
        let list = &mut buffers[ply];
        list.clear();
        generate_all(pos, list);
    }

    let count = buffers[ply].len();
    let mut nodes = 0;
    for i in 0..count {
        let mv = buffers[ply][i];
        let (undo, legal) = pos.make(mv);
        if legal {
            nodes += perft_inner(pos, depth - 1, ply + 1, buffers);
        }
        pos.unmake(mv, undo);
    }
    nodes
}

#[instrument(skip(pos), fields(fen = %pos.to_fen()))]
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    let mut buffers: Vec<Vec<Move>> = (0..MAX_PERFT_DEPTH)
        .map(|_| Vec::with_capacity(256))
        .collect();
    let nodes = perft_inner(pos, depth, 0, &mut buffers);
    debug!(depth, nodes, "perft complete");
    nodes
}

/// Per-root-move breakdown, matching the `divide` convention.
pub fn perft_divide(pos: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    let mut buffers: Vec<Vec<Move>> = (0..MAX_PERFT_DEPTH)
        .map(|_| Vec::with_capacity(256))
        .collect();
    let mut roots: Vec<Move> = Vec::new();
    generate_all(pos, &mut roots);

    let mut out = Vec::new();
    for mv in roots {
        let (undo, legal) = pos.make(mv);
        if legal {
            let nodes = if depth > 1 {
                perft_inner(pos, depth - 1, 1, &mut buffers)
            } else {
                1
            };
            out.push((mv, nodes));
        }
        pos.unmake(mv, undo);
    }
    out
}
