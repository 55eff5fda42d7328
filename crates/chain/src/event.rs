//! Inputs and outputs of the chain state machine.
//!
//! Events are **passive data** — they describe something that happened.
//! Actions are **commands** — they describe I/O for the runner to perform.
//! The state machine itself is synchronous and does no I/O.

use pollchain_codec::Transaction;
use pollchain_types::{Action, PeerAddr};

/// Something that happened that the chain must react to.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A transaction frame arrived from a peer.
    TransactionReceived {
        from: PeerAddr,
        transaction: Transaction,
    },

    /// A participant on this node cast a vote.
    VoteSubmitted { vote: Action },
}

impl ChainEvent {
    /// Event name for log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            ChainEvent::TransactionReceived { .. } => "TransactionReceived",
            ChainEvent::VoteSubmitted { .. } => "VoteSubmitted",
        }
    }
}

/// I/O the chain wants performed. Both sends are best-effort: the runner
/// ignores transport refusals.
#[derive(Debug, Clone)]
pub enum ChainAction {
    /// Deliver a transaction to one peer.
    Send {
        to: PeerAddr,
        transaction: Transaction,
    },

    /// Deliver a transaction to every reachable peer.
    Broadcast { transaction: Transaction },
}

impl ChainAction {
    /// Action name for log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            ChainAction::Send { .. } => "Send",
            ChainAction::Broadcast { .. } => "Broadcast",
        }
    }
}
