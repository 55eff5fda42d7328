//! Append-only DAG of attached blocks.
//!
//! Blocks live in a vector; parent→child edges are vectors of indices into
//! it and hash lookup goes through a side map. This sidesteps owning
//! reference cycles between parents and children and keeps traversal free of
//! allocation. The structure is acyclic by construction: hashes are
//! content-addressed, so a cycle would need a SHA-256 preimage collision.

use crate::staging::PowQueue;
use pollchain_types::{Block, Hash};
use std::collections::HashMap;

/// Position of an attached block in the DAG's backing vector.
pub type BlockIndex = usize;

/// A block stored in the DAG with its content hash and child links.
///
/// Never mutated after attachment except by appending child indices.
#[derive(Debug, Clone)]
pub struct AttachedBlock {
    block: Block,
    hash: Hash,
    children: Vec<BlockIndex>,
}

impl AttachedBlock {
    fn new(block: Block) -> Self {
        AttachedBlock {
            hash: block.hash(),
            block,
            children: Vec::new(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn children(&self) -> &[BlockIndex] {
        &self.children
    }
}

/// Result of [`BlockDag::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The block is now part of the DAG.
    Attached,
    /// A block with the same hash is already attached; no state change.
    Duplicate,
    /// The block's parent is unknown; no state change.
    Orphan,
}

/// Append-only set of verified blocks rooted at the genesis block.
#[derive(Debug)]
pub struct BlockDag {
    blocks: Vec<AttachedBlock>,
    index: HashMap<Hash, BlockIndex>,
}

impl BlockDag {
    /// Index of the genesis block.
    pub const GENESIS: BlockIndex = 0;

    /// A DAG holding only `genesis`.
    pub fn new(genesis: Block) -> Self {
        let root = AttachedBlock::new(genesis);
        let mut index = HashMap::new();
        index.insert(*root.hash(), Self::GENESIS);
        BlockDag {
            blocks: vec![root],
            index,
        }
    }

    /// Attach a verified block under its parent.
    ///
    /// Precondition: the block's proof-of-work has been validated by the
    /// caller. Duplicate attachment is a no-op reported as such.
    pub fn attach(&mut self, block: Block) -> AttachOutcome {
        let hash = block.hash();
        if self.index.contains_key(&hash) {
            return AttachOutcome::Duplicate;
        }

        let Some(&parent_index) = self.index.get(&block.previous_hash) else {
            return AttachOutcome::Orphan;
        };

        self.blocks.push(AttachedBlock::new(block));
        let index = self.blocks.len() - 1;
        self.blocks[parent_index].children.push(index);
        self.index.insert(hash, index);

        AttachOutcome::Attached
    }

    /// Whether a block with this hash is attached.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.index.contains_key(hash)
    }

    /// Index of the attached block with this hash.
    pub fn index_of(&self, hash: &Hash) -> Option<BlockIndex> {
        self.index.get(hash).copied()
    }

    pub fn get(&self, index: BlockIndex) -> &AttachedBlock {
        &self.blocks[index]
    }

    /// Number of attached blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        // The genesis block is always present.
        self.blocks.is_empty()
    }

    /// All attached blocks in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = &AttachedBlock> {
        self.blocks.iter()
    }

    /// Leaf of the deepest chain from the genesis block.
    ///
    /// Ties are broken in favour of the first-inserted child, so the result
    /// is stable under re-evaluation.
    pub fn longest_tip(&self) -> BlockIndex {
        // A child is always appended after its parent, so a reverse scan
        // sees every subtree result before the node that needs it.
        let mut subtree: Vec<(usize, BlockIndex)> = vec![(0, 0); self.blocks.len()];

        for index in (0..self.blocks.len()).rev() {
            let node = &self.blocks[index];
            let mut best: Option<(usize, BlockIndex)> = None;

            for &child in &node.children {
                let (depth, leaf) = subtree[child];
                let deeper = match best {
                    Some((best_depth, _)) => depth + 1 > best_depth,
                    None => true,
                };
                if deeper {
                    best = Some((depth + 1, leaf));
                }
            }

            subtree[index] = best.unwrap_or((0, index));
        }

        subtree[Self::GENESIS].1
    }
}

/// Attach a verified block and flag same-parent queued blocks as replaced.
///
/// Every attachment path (receive, reconcile, local seal) must go through
/// this so a competitor taking a parent slot always invalidates our own
/// queued block for that slot.
pub(crate) fn attach_verified(
    dag: &mut BlockDag,
    queue: &mut PowQueue,
    block: Block,
) -> AttachOutcome {
    let parent = block.previous_hash;
    let outcome = dag.attach(block);
    if outcome == AttachOutcome::Attached {
        queue.mark_replaced(&parent);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollchain_types::Action;

    fn child_of(parent: &Hash, tag: u8) -> Block {
        let mut block = Block::unsigned(*parent);
        block.push_vote(Action(tag));
        block
    }

    fn dag_with_genesis() -> (BlockDag, Hash) {
        let genesis = Block::genesis_template();
        let hash = genesis.hash();
        (BlockDag::new(genesis), hash)
    }

    #[test]
    fn attach_links_child_to_parent() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        let block = child_of(&genesis_hash, b'a');

        assert_eq!(dag.attach(block), AttachOutcome::Attached);
        assert_eq!(dag.len(), 2);
        assert_eq!(dag.get(BlockDag::GENESIS).children(), &[1]);
        assert_eq!(dag.index_of(&block.hash()), Some(1));
    }

    #[test]
    fn attach_is_idempotent() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        let block = child_of(&genesis_hash, b'a');

        assert_eq!(dag.attach(block), AttachOutcome::Attached);
        assert_eq!(dag.attach(block), AttachOutcome::Duplicate);
        assert_eq!(dag.len(), 2);
        assert_eq!(dag.get(BlockDag::GENESIS).children(), &[1]);
    }

    #[test]
    fn unknown_parent_is_an_orphan() {
        let (mut dag, _) = dag_with_genesis();
        let block = child_of(&Hash::compute(b"nowhere"), b'a');

        assert_eq!(dag.attach(block), AttachOutcome::Orphan);
        assert_eq!(dag.len(), 1);
        assert!(!dag.contains(&block.hash()));
    }

    #[test]
    fn hash_index_is_injective() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        for tag in 0..4u8 {
            dag.attach(child_of(&genesis_hash, tag));
        }
        let mut seen = std::collections::HashSet::new();
        for block in dag.iter() {
            assert!(seen.insert(*block.hash()));
        }
    }

    #[test]
    fn longest_tip_of_lone_genesis_is_genesis() {
        let (dag, _) = dag_with_genesis();
        assert_eq!(dag.longest_tip(), BlockDag::GENESIS);
    }

    #[test]
    fn deeper_branch_wins() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        let short = child_of(&genesis_hash, b'a');
        let long_1 = child_of(&genesis_hash, b'b');
        let long_2 = child_of(&long_1.hash(), b'c');

        dag.attach(short);
        dag.attach(long_1);
        dag.attach(long_2);

        assert_eq!(dag.longest_tip(), dag.index_of(&long_2.hash()).unwrap());
    }

    #[test]
    fn depth_ties_go_to_the_first_inserted_child() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        let first = child_of(&genesis_hash, b'a');
        let second = child_of(&genesis_hash, b'b');

        dag.attach(first);
        dag.attach(second);

        assert_eq!(dag.longest_tip(), dag.index_of(&first.hash()).unwrap());
    }

    #[test]
    fn attach_verified_marks_queued_competitors() {
        let (mut dag, genesis_hash) = dag_with_genesis();
        let mut queue = PowQueue::default();

        let mut ours = Block::unsigned(genesis_hash);
        ours.push_vote(Action(b'x'));
        queue.push(ours);

        let theirs = child_of(&genesis_hash, b'y');
        assert_eq!(
            attach_verified(&mut dag, &mut queue, theirs),
            AttachOutcome::Attached
        );
        assert_eq!(queue.discard_replaced(), 1);
        assert!(queue.is_empty());
    }
}
