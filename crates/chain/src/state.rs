//! The replicated voting-chain state machine.

use crate::dag::{attach_verified, AttachOutcome, BlockDag};
use crate::event::{ChainAction, ChainEvent};
use crate::pending::PendingPool;
use crate::staging::{PowQueue, Staging};
use pollchain_codec::{Payload, Transaction, TransactionKind, MAGIC};
use pollchain_pow::{genesis_block, validate_block, SealOutcome, Sealer};
use pollchain_types::{Action, Block, Channel, Hash, NodeId, PeerAddr};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// A backward sequence jump larger than this is taken for a peer restart:
/// the expected counter resets instead of silencing the peer until its
/// fresh counter catches up. Jumps within the gap are replays and are
/// dropped.
pub const SEQ_RESTART_GAP: u32 = 1024;

/// Counters logged once per run-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    /// Attached blocks, genesis included.
    pub attached: usize,
    /// Orphans awaiting a parent.
    pub pending: usize,
    /// Full blocks awaiting a nonce.
    pub queued: usize,
    /// Votes in the staging block.
    pub staged_votes: usize,
}

/// One node's replica of the voting chain.
///
/// Synchronous and deterministic apart from the sealing RNG: events go in
/// through [`handle`](ChainState::handle), I/O comes out as
/// [`ChainAction`]s, and the runner owns the clock and the transport. The
/// replica exclusively owns its DAG, pending pool, staging block, PoW queue
/// and sequence map; nothing here is shared or locked.
pub struct ChainState {
    node_id: NodeId,
    channel: Channel,
    dag: BlockDag,
    pending: PendingPool,
    staging: Staging,
    queue: PowQueue,
    sealer: Sealer,
    next_seq: u32,
    expected_seq: HashMap<PeerAddr, u32>,
}

impl ChainState {
    /// Build a replica: attach the shared genesis block and announce
    /// ourselves with a DISCOVER so peers sync us their chains.
    pub fn new(node_id: NodeId, channel: Channel, sealer: Sealer) -> (Self, Vec<ChainAction>) {
        let genesis = genesis_block();
        info!(node = %node_id, genesis = %genesis.hash(), "sealed genesis block");

        let mut state = ChainState {
            node_id,
            channel,
            dag: BlockDag::new(genesis),
            pending: PendingPool::default(),
            staging: Staging::default(),
            queue: PowQueue::default(),
            sealer,
            next_seq: 0,
            expected_seq: HashMap::new(),
        };

        let discover = state.stamp(TransactionKind::Discover, Payload::Discover);
        (
            state,
            vec![ChainAction::Broadcast {
                transaction: discover,
            }],
        )
    }

    /// Feed one event through the state machine.
    pub fn handle(&mut self, event: ChainEvent) -> Vec<ChainAction> {
        match event {
            ChainEvent::TransactionReceived { from, transaction } => {
                self.on_transaction(from, transaction)
            }
            ChainEvent::VoteSubmitted { vote } => self.on_vote_submitted(vote),
        }
    }

    /// Protocol dispatch for one incoming transaction.
    fn on_transaction(&mut self, from: PeerAddr, tx: Transaction) -> Vec<ChainAction> {
        let expected = self.expected_seq.get(&from).copied().unwrap_or(0);
        if tx.sequence < expected {
            let gap = expected - tx.sequence;
            if gap <= SEQ_RESTART_GAP {
                debug!(
                    peer = %from,
                    sequence = tx.sequence,
                    expected,
                    "dropping stale transaction"
                );
                return Vec::new();
            }
            debug!(
                peer = %from,
                sequence = tx.sequence,
                expected,
                "sequence jumped far backwards, assuming peer restart"
            );
        }

        if tx.magic != MAGIC {
            debug!(peer = %from, magic = %format_args!("{:08X}", tx.magic), "dropping transaction with wrong magic");
            return Vec::new();
        }

        if tx.channel != self.channel {
            debug!(
                peer = %from,
                channel = %tx.channel,
                ours = %self.channel,
                "dropping transaction for another channel"
            );
            return Vec::new();
        }

        self.expected_seq.insert(from, tx.sequence.wrapping_add(1));

        debug!(
            peer = %from,
            kind = tx.kind.name(),
            sequence = tx.sequence,
            "received transaction"
        );

        match (tx.kind, tx.payload) {
            (TransactionKind::Discover, Payload::Discover) => self.sync_chain_to(from),
            (_, Payload::Block(block)) => {
                self.receive_block(block);
                Vec::new()
            }
            (_, Payload::Act(vote)) => {
                self.apply_vote(vote);
                Vec::new()
            }
            // Kind and payload arm always agree for decoded frames.
            _ => Vec::new(),
        }
    }

    /// A locally cast vote: stage it and tell every peer to do the same.
    fn on_vote_submitted(&mut self, vote: Action) -> Vec<ChainAction> {
        debug!(node = %self.node_id, vote = %vote, "broadcasting act request");
        self.apply_vote(vote);
        let act = self.stamp(TransactionKind::Act, Payload::Act(vote));
        vec![ChainAction::Broadcast { transaction: act }]
    }

    /// Unicast our whole chain, one SYNC frame per attached block, to a
    /// peer that asked to discover it.
    fn sync_chain_to(&mut self, requester: PeerAddr) -> Vec<ChainAction> {
        let blocks: Vec<Block> = self.dag.iter().map(|entry| *entry.block()).collect();
        debug!(peer = %requester, blocks = blocks.len(), "syncing chain to requester");

        blocks
            .into_iter()
            .map(|block| ChainAction::Send {
                to: requester,
                transaction: self.stamp(TransactionKind::Sync, Payload::Block(block)),
            })
            .collect()
    }

    /// Verify and place one block received off the wire.
    fn receive_block(&mut self, block: Block) {
        let hash = block.hash();

        if !validate_block(&block) {
            debug!(hash = %hash, "discarding block with invalid proof-of-work");
            return;
        }

        if self.pending.contains(&hash) {
            debug!(hash = %hash, "discarding duplicate of a pending orphan");
            return;
        }

        match attach_verified(&mut self.dag, &mut self.queue, block) {
            AttachOutcome::Attached => {
                debug!(hash = %hash, parent = %block.previous_hash, "attached block");
            }
            AttachOutcome::Duplicate => {
                debug!(hash = %hash, "discarding duplicate block");
            }
            AttachOutcome::Orphan => {
                debug!(hash = %hash, "parent unknown, orphan marked pending");
                self.pending.push(hash, block);
            }
        }
    }

    /// Stage one vote; promote the staging block to the PoW queue when it
    /// fills.
    fn apply_vote(&mut self, vote: Action) {
        let dag = &self.dag;
        if let Some(full) = self
            .staging
            .push_vote(vote, || *dag.get(dag.longest_tip()).hash())
        {
            debug!(parent = %full.previous_hash, "staging block full, queued for sealing");
            self.queue.push(full);
        }
    }

    /// Drain pending orphans whose parents have arrived.
    pub fn reconcile(&mut self) -> usize {
        self.pending.reconcile(&mut self.dag, &mut self.queue)
    }

    /// One sealing-loop iteration: discard replaced queue entries, then
    /// spend up to `budget` searching for the front block's nonce. On
    /// success the block is attached locally and announced with
    /// NOTIFY_SIGNED. A timeout is not an error; the search resumes next
    /// iteration.
    pub fn try_seal(&mut self, budget: Duration) -> Vec<ChainAction> {
        let discarded = self.queue.discard_replaced();
        if discarded > 0 {
            debug!(discarded, "discarded replaced queued blocks unsigned");
        }

        let Some(front) = self.queue.front_mut() else {
            return Vec::new();
        };

        match self.sealer.seal(&mut front.block, budget) {
            SealOutcome::TimedOut => Vec::new(),
            SealOutcome::Sealed => {
                let sealed = front.block;
                self.queue.pop_front();

                let outcome = attach_verified(&mut self.dag, &mut self.queue, sealed);
                // The parent was attached when the block was staged and the
                // DAG never forgets, so local attachment cannot orphan.
                debug_assert_eq!(outcome, AttachOutcome::Attached);

                info!(node = %self.node_id, hash = %sealed.hash(), "sealed block, notifying peers");
                let notify = self.stamp(TransactionKind::NotifySigned, Payload::Block(sealed));
                vec![ChainAction::Broadcast { transaction: notify }]
            }
        }
    }

    /// Tally the votes along the longest chain, excluding the genesis
    /// block. Ties go to the lowest vote byte; an empty history elects
    /// `'0'`.
    pub fn winner(&self) -> Action {
        let mut counts = [0u32; 256];

        let mut index = self.dag.longest_tip();
        while index != BlockDag::GENESIS {
            let entry = self.dag.get(index);
            for &vote in entry.block().recorded_votes() {
                counts[vote as usize] += 1;
            }
            match self.dag.index_of(&entry.block().previous_hash) {
                Some(parent) => index = parent,
                // Unreachable: every attached non-genesis block has an
                // attached parent.
                None => break,
            }
        }

        let mut winner = b'0';
        let mut max_votes = 0u32;
        for (candidate, &count) in counts.iter().enumerate() {
            if count > max_votes {
                max_votes = count;
                winner = candidate as u8;
            }
        }

        Action(winner)
    }

    /// Snapshot of the replica's bookkeeping for the status log line.
    pub fn status(&self) -> ChainStatus {
        ChainStatus {
            attached: self.dag.len(),
            pending: self.pending.len(),
            queued: self.queue.len(),
            staged_votes: self.staging.vote_count(),
        }
    }

    /// Hash of the longest chain's tip.
    pub fn tip_hash(&self) -> Hash {
        *self.dag.get(self.dag.longest_tip()).hash()
    }

    /// Read access to the DAG.
    pub fn dag(&self) -> &BlockDag {
        &self.dag
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Stamp an outbound transaction with the next sequence number.
    fn stamp(&mut self, kind: TransactionKind, payload: Payload) -> Transaction {
        let sequence = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        Transaction::new(self.channel, kind, sequence, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(tag: u8) -> PeerAddr {
        let mut bytes = [0u8; 16];
        bytes[0] = tag;
        PeerAddr::from_bytes(bytes)
    }

    fn test_state() -> ChainState {
        let (state, actions) = ChainState::new(NodeId(0), Channel(7), Sealer::new(1));
        assert_eq!(actions.len(), 1);
        state
    }

    fn received(from: PeerAddr, tx: Transaction) -> ChainEvent {
        ChainEvent::TransactionReceived {
            from,
            transaction: tx,
        }
    }

    #[test]
    fn startup_broadcasts_discover() {
        let (_, actions) = ChainState::new(NodeId(0), Channel(7), Sealer::new(1));
        match &actions[..] {
            [ChainAction::Broadcast { transaction }] => {
                assert_eq!(transaction.kind, TransactionKind::Discover);
                assert_eq!(transaction.sequence, 0);
            }
            other => panic!("expected a single DISCOVER broadcast, got {:?}", other),
        }
    }

    #[test]
    fn stale_sequence_is_dropped() {
        let mut state = test_state();
        let sender = peer(1);

        let fresh = Transaction::new(Channel(7), TransactionKind::Act, 5, Payload::Act(Action(b'A')));
        assert!(state.handle(received(sender, fresh)).is_empty());
        assert_eq!(state.status().staged_votes, 1);

        let stale = Transaction::new(Channel(7), TransactionKind::Act, 3, Payload::Act(Action(b'B')));
        state.handle(received(sender, stale));
        // The replayed vote must not reach staging.
        assert_eq!(state.status().staged_votes, 1);
    }

    #[test]
    fn large_backward_jump_resets_the_peer() {
        let mut state = test_state();
        let sender = peer(1);

        let high = Transaction::new(
            Channel(7),
            TransactionKind::Act,
            50_000,
            Payload::Act(Action(b'A')),
        );
        state.handle(received(sender, high));

        // A restarted peer begins from zero again; far below the gap, so it
        // is accepted and the expected counter follows it.
        let restarted =
            Transaction::new(Channel(7), TransactionKind::Act, 0, Payload::Act(Action(b'B')));
        state.handle(received(sender, restarted));
        assert_eq!(state.status().staged_votes, 2);

        let next = Transaction::new(Channel(7), TransactionKind::Act, 1, Payload::Act(Action(b'C')));
        state.handle(received(sender, next));
        assert_eq!(state.status().staged_votes, 3);
    }

    #[test]
    fn wrong_magic_is_dropped_and_does_not_advance_sequence() {
        let mut state = test_state();
        let sender = peer(1);

        let mut tx = Transaction::new(Channel(7), TransactionKind::Act, 9, Payload::Act(Action(b'A')));
        tx.magic = 0x4241_4443;
        state.handle(received(sender, tx));
        assert_eq!(state.status().staged_votes, 0);

        // The dropped frame must not have claimed sequence 9.
        let good = Transaction::new(Channel(7), TransactionKind::Act, 9, Payload::Act(Action(b'A')));
        state.handle(received(sender, good));
        assert_eq!(state.status().staged_votes, 1);
    }

    #[test]
    fn wrong_channel_is_dropped() {
        let mut state = test_state();
        let tx = Transaction::new(Channel(8), TransactionKind::Act, 0, Payload::Act(Action(b'A')));
        assert!(state.handle(received(peer(1), tx)).is_empty());
        assert_eq!(state.status().staged_votes, 0);
    }

    #[test]
    fn remote_act_stages_without_rebroadcast() {
        let mut state = test_state();
        let tx = Transaction::new(Channel(7), TransactionKind::Act, 0, Payload::Act(Action(b'A')));
        let actions = state.handle(received(peer(1), tx));
        assert!(actions.is_empty());
        assert_eq!(state.status().staged_votes, 1);
    }

    #[test]
    fn local_vote_stages_and_broadcasts() {
        let mut state = test_state();
        let actions = state.handle(ChainEvent::VoteSubmitted {
            vote: Action(b'A'),
        });

        assert_eq!(state.status().staged_votes, 1);
        match &actions[..] {
            [ChainAction::Broadcast { transaction }] => {
                assert_eq!(transaction.kind, TransactionKind::Act);
                assert_eq!(transaction.payload, Payload::Act(Action(b'A')));
            }
            other => panic!("expected a single ACT broadcast, got {:?}", other),
        }
    }

    #[test]
    fn discover_gets_the_chain_unicast() {
        let mut state = test_state();
        let requester = peer(2);

        let discover = Transaction::new(Channel(7), TransactionKind::Discover, 0, Payload::Discover);
        let actions = state.handle(received(requester, discover));

        // Only the genesis block is attached, so exactly one SYNC, sent to
        // the requester rather than broadcast.
        match &actions[..] {
            [ChainAction::Send { to, transaction }] => {
                assert_eq!(*to, requester);
                assert_eq!(transaction.kind, TransactionKind::Sync);
                assert_eq!(
                    transaction.payload,
                    Payload::Block(genesis_block())
                );
            }
            other => panic!("expected one unicast SYNC, got {:?}", other),
        }
    }

    #[test]
    fn outbound_sequence_numbers_increase() {
        let mut state = test_state();
        // Sequence 0 went to the startup DISCOVER.
        let first = state.handle(ChainEvent::VoteSubmitted { vote: Action(b'A') });
        let second = state.handle(ChainEvent::VoteSubmitted { vote: Action(b'B') });

        let seq = |actions: &[ChainAction]| match actions {
            [ChainAction::Broadcast { transaction }] => transaction.sequence,
            other => panic!("expected one broadcast, got {:?}", other),
        };
        assert_eq!(seq(&first), 1);
        assert_eq!(seq(&second), 2);
    }

    #[test]
    fn invalid_pow_is_dropped() {
        let mut state = test_state();
        let mut bogus = Block::unsigned(state.tip_hash());
        bogus.push_vote(Action(b'A'));
        // An unsigned block fails the difficulty check.
        assert!(!validate_block(&bogus));

        let tx = Transaction::new(
            Channel(7),
            TransactionKind::NotifySigned,
            0,
            Payload::Block(bogus),
        );
        state.handle(received(peer(1), tx));

        let status = state.status();
        assert_eq!(status.attached, 1);
        assert_eq!(status.pending, 0);
    }

    #[test]
    fn winner_of_an_empty_chain_is_zero() {
        let state = test_state();
        assert_eq!(state.winner(), Action(b'0'));
    }
}
