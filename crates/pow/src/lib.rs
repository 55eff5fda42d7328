//! Proof-of-work sealing and verification.
//!
//! Not mining in the economic sense — sealing is what turns a full staging
//! block into an immutable chain entry. A block is sealed when a 32-bit
//! nonce makes the low [`DIFFICULTY_BITS`](pollchain_types::DIFFICULTY_BITS)
//! bits of its hash's first word zero.
//!
//! The nonce search is *random*, not a counter: replicas racing to seal
//! different blocks must not walk the same nonce sequence in lock-step. The
//! one exception is the genesis block, which every node seals with a
//! deterministic counter search so that all nodes agree on a single
//! well-known genesis hash.

mod generator;
mod validator;

pub use generator::{genesis_block, SealOutcome, Sealer};
pub use validator::validate_block;
