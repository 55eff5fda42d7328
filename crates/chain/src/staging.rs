//! Vote staging and the proof-of-work queue.

use pollchain_types::{Action, Block, Hash};
use std::collections::VecDeque;

/// A full unsigned block awaiting a nonce.
#[derive(Debug, Clone, Copy)]
pub struct QueuedBlock {
    pub block: Block,
    /// Set when a competing block with the same parent becomes attached;
    /// the sealing loop discards flagged entries instead of spending CPU on
    /// a slot that is already taken.
    pub replaced: bool,
}

/// FIFO of full unsigned blocks waiting for the sealing loop.
#[derive(Debug, Default)]
pub struct PowQueue {
    queue: VecDeque<QueuedBlock>,
}

impl PowQueue {
    pub fn push(&mut self, block: Block) {
        self.queue.push_back(QueuedBlock {
            block,
            replaced: false,
        });
    }

    /// Flag every queued block chaining off `parent` as replaced.
    pub fn mark_replaced(&mut self, parent: &Hash) {
        for entry in &mut self.queue {
            if entry.block.previous_hash == *parent {
                entry.replaced = true;
            }
        }
    }

    /// Drop replaced entries from the front; returns how many were dropped.
    pub fn discard_replaced(&mut self) -> usize {
        let mut dropped = 0;
        while self.queue.front().is_some_and(|entry| entry.replaced) {
            self.queue.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn front_mut(&mut self) -> Option<&mut QueuedBlock> {
        self.queue.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<QueuedBlock> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// The single unsigned block under construction.
///
/// The parent is chosen when the first vote arrives, not at seal time: while
/// the block sits in the PoW queue other blocks may take the tip, which is
/// what the `replaced` flag on queued entries catches.
#[derive(Debug, Default)]
pub struct Staging {
    current: Option<Block>,
}

impl Staging {
    /// Record one vote into the staging block, creating it off `parent` if
    /// none exists. Returns the block once it is full; staging is empty
    /// again afterwards, so a full block never stays resident here.
    pub fn push_vote(&mut self, vote: Action, parent: impl FnOnce() -> Hash) -> Option<Block> {
        let block = self.current.get_or_insert_with(|| Block::unsigned(parent()));
        block.push_vote(vote);

        if block.is_full() {
            return self.current.take();
        }
        None
    }

    /// Votes currently staged, 0..=23.
    pub fn vote_count(&self) -> usize {
        self.current.map_or(0, |block| block.count_votes as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
