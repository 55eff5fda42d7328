//! PoW validation.

use pollchain_types::{difficulty_mask, Block};

/// Check that a block's hash clears the difficulty mask.
///
/// Recomputes the hash from the canonical byte image, so the check holds for
/// blocks received off the wire as well as locally sealed ones.
pub fn validate_block(block: &Block) -> bool {
    block.hash().word(0) & difficulty_mask() == 0
}
