//! PoW generation (CPU).

use crate::validator::validate_block;
use pollchain_types::Block;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a bounded sealing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SealOutcome {
    /// The block now carries a valid nonce.
    Sealed,
    /// The budget elapsed first; the block is unchanged except for the
    /// nonce field, which holds the last rejected candidate.
    TimedOut,
}

/// Random-nonce proof-of-work search.
///
/// Each node owns one sealer seeded independently, so replicas racing to
/// seal different blocks do not draw correlated nonce sequences.
pub struct Sealer {
    rng: ChaCha8Rng,
}

impl Sealer {
    /// A sealer drawing from the given seed. Tests use fixed seeds for
    /// reproducible searches.
    pub fn new(seed: u64) -> Self {
        Sealer {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// A sealer seeded from the operating system.
    pub fn from_entropy() -> Self {
        Sealer {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Search for a nonce within `budget` of wall-clock time.
    ///
    /// Only `pow_signature` is mutated; the parent hash and votes are fixed
    /// before sealing starts. Expected work is 2^22 hash attempts.
    pub fn seal(&mut self, block: &mut Block, budget: Duration) -> SealOutcome {
        let start = Instant::now();
        loop {
            block.pow_signature = self.rng.gen();
            if validate_block(block) {
                debug!(hash = %block.hash(), "sealed block");
                return SealOutcome::Sealed;
            }
            if start.elapsed() >= budget {
                return SealOutcome::TimedOut;
            }
        }
    }
}

fn seal_genesis() -> Block {
    let mut block = Block::genesis_template();
    let mut nonce = 0u32;
    loop {
        block.pow_signature = nonce;
        if validate_block(&block) {
            return block;
        }
        nonce = nonce
            .checked_add(1)
            .expect("no 32-bit nonce seals the genesis block");
    }
}

/// The shared genesis block.
///
/// Sealed by a deterministic counter search from nonce zero, so every node
/// independently derives the same block and therefore the same genesis
/// hash. Computed once per process; the search is an unbounded startup cost
/// of roughly 2^22 hash attempts.
pub fn genesis_block() -> Block {
    static GENESIS: OnceLock<Block> = OnceLock::new();
    *GENESIS.get_or_init(seal_genesis)
}
