//! Tunable search options. Written once while the engine is idle
//! (setoption / init file), read freely by the driver and workers.

pub const MAX_THREADS: usize = 64;
pub const MAX_HASH_MB: usize = 4096;
pub const DEFAULT_HASH_MB: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub threads: usize,
    pub hash_mb: usize,
    pub ponder: bool,
    pub null_move: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            threads: 1,
            hash_mb: DEFAULT_HASH_MB,
            ponder: false,
            null_move: true,
        }
    }
}

impl SearchParams {
    pub fn set_threads(&mut self, n: usize) {
        self.threads = n.clamp(1, MAX_THREADS);
    }

    pub fn set_hash_mb(&mut self, mb: usize) {
        self.hash_mb = mb.clamp(1, MAX_HASH_MB);
    }
}
