//! Blocks and the votes they carry.

use crate::Hash;
use std::fmt;

/// Votes per sealed block.
pub const BLOCK_VOTES: usize = 24;

/// A single-byte ballot cast by a participant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action(pub u8);

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({:?})", self.0 as char)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// A block record with fixed layout.
///
/// The canonical byte image (`to_bytes`) doubles as the hashing preimage and
/// the wire payload: `pow_signature(4 LE) ‖ previous_hash(32) ‖ votes(24) ‖
/// count_votes(1)`, 61 bytes total.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Nonce found by the proof-of-work search.
    pub pow_signature: u32,
    /// Content hash of the parent block.
    pub previous_hash: Hash,
    /// Vote bytes; only the first `count_votes` entries are meaningful.
    pub votes: [u8; BLOCK_VOTES],
    /// Number of votes recorded, 0..=24.
    pub count_votes: u8,
}

impl Block {
    /// Width of the canonical byte image.
    pub const ENCODED_LEN: usize = 4 + Hash::LEN + BLOCK_VOTES + 1;

    /// A fresh unsigned block chaining off `previous_hash`.
    pub fn unsigned(previous_hash: Hash) -> Self {
        Block {
            pow_signature: 0,
            previous_hash,
            votes: [0; BLOCK_VOTES],
            count_votes: 0,
        }
    }

    /// The all-zero block every node seals into the shared genesis.
    pub fn genesis_template() -> Self {
        Block::unsigned(Hash::ZERO)
    }

    /// Record one vote.
    ///
    /// Panics if the block is already full; staging promotes a block to the
    /// proof-of-work queue on its 24th vote, so a full block never receives
    /// another one.
    pub fn push_vote(&mut self, action: Action) {
        assert!(!self.is_full(), "vote pushed into a full block");
        self.votes[self.count_votes as usize] = action.0;
        self.count_votes += 1;
    }

    /// Whether the block holds [`BLOCK_VOTES`] votes and is ready to seal.
    pub fn is_full(&self) -> bool {
        self.count_votes as usize == BLOCK_VOTES
    }

    /// The recorded votes.
    pub fn recorded_votes(&self) -> &[u8] {
        &self.votes[..self.count_votes as usize]
    }

    /// Content hash of the canonical byte image.
    pub fn hash(&self) -> Hash {
        Hash::compute(&self.to_bytes())
    }

    /// Canonical byte image: hashing preimage and wire payload.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..4].copy_from_slice(&self.pow_signature.to_le_bytes());
        out[4..36].copy_from_slice(&self.previous_hash.to_bytes());
        out[36..60].copy_from_slice(&self.votes);
        out[60] = self.count_votes;
        out
    }

    /// Rebuild a block from its canonical image.
    ///
    /// Returns `None` when the recorded vote count exceeds the vote array;
    /// such an image cannot have been produced by `to_bytes`.
    pub fn from_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> Option<Self> {
        let count_votes = bytes[60];
        if count_votes as usize > BLOCK_VOTES {
            return None;
        }

        let mut previous = [0u8; Hash::LEN];
        previous.copy_from_slice(&bytes[4..36]);
        let mut votes = [0u8; BLOCK_VOTES];
        votes.copy_from_slice(&bytes[36..60]);

        Some(Block {
            pow_signature: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            previous_hash: Hash::from_bytes(&previous),
            votes,
            count_votes,
        })
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("pow_signature", &self.pow_signature)
            .field("previous_hash", &self.previous_hash)
            .field("count_votes", &self.count_votes)
            .finish()
    }
}
