//! 256-bit content hash.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit digest stored as eight little-endian `u32` words.
///
/// Word 0 carries the difficulty bits checked by proof-of-work
/// verification. Equality and the map key behaviour are derived from the
/// word array, so two hashes are equal iff their byte images are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u32; 8]);

impl Hash {
    /// The all-zero hash, used as the parent reference of the genesis block.
    pub const ZERO: Hash = Hash([0; 8]);

    /// Encoded width in bytes.
    pub const LEN: usize = 32;

    /// SHA-256 of `bytes`, with each 4-byte digest group read little-endian.
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut words = [0u32; 8];
        for (i, chunk) in digest.chunks_exact(4).enumerate() {
            words[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Hash(words)
    }

    /// Word `i` of the digest. Word 0 is tested against the difficulty mask.
    pub fn word(&self, i: usize) -> u32 {
        self.0[i]
    }

    /// The 32-byte little-endian image used on the wire.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        for (i, word) in self.0.iter().enumerate() {
            out[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Rebuild a hash from its 32-byte wire image.
    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        let mut words = [0u32; 8];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            words[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Hash(words)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in &self.0 {
            write!(f, "{:08X}", word)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}
