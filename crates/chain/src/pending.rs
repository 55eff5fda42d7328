//! Orphans awaiting a known parent.

use crate::dag::{attach_verified, AttachOutcome, BlockDag};
use crate::staging::PowQueue;
use pollchain_types::{Block, Hash};
use tracing::debug;

/// Verified blocks whose parents have not been attached yet.
///
/// Entries are created on receipt and destroyed either by attachment or by
/// process exit; nothing here is persisted.
#[derive(Debug, Default)]
pub struct PendingPool {
    orphans: Vec<(Hash, Block)>,
}

impl PendingPool {
    pub fn push(&mut self, hash: Hash, block: Block) {
        self.orphans.push((hash, block));
    }

    /// Whether an orphan with this hash is waiting. Used together with the
    /// DAG index for duplicate suppression.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.orphans.iter().any(|(stored, _)| stored == hash)
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    /// Attach every orphan whose parent is now known.
    ///
    /// One pending block may be the parent of another, so full passes repeat
    /// until a pass makes no progress. This terminates: every repeated pass
    /// removes at least one orphan. Returns the number attached.
    pub fn reconcile(&mut self, dag: &mut BlockDag, queue: &mut PowQueue) -> usize {
        let mut attached = 0;

        loop {
            let before = self.orphans.len();

            self.orphans.retain(|(hash, block)| {
                match attach_verified(dag, queue, *block) {
                    AttachOutcome::Attached => {
                        debug!(hash = %hash, "attached pending orphan");
                        attached += 1;
                        false
                    }
                    // A duplicate means the block arrived through another
                    // path while it sat here; it is done either way.
                    AttachOutcome::Duplicate => false,
                    AttachOutcome::Orphan => true,
                }
            });

            if self.orphans.len() == before {
                return attached;
            }
        }
    }
}
