//! Bounded-latency cooperative run loop.

use crate::probe::ActProbe;
use pollchain_chain::{ChainAction, ChainEvent, ChainState};
use pollchain_codec::{decode, encode};
use pollchain_transport::Transport;
use pollchain_types::Action;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Single-threaded loop tying listen → reconcile → seal → act together.
///
/// Each iteration targets one fixed period (one second in production). The
/// only blocking points are the proof-of-work search, bounded by whatever
/// remains of the iteration budget, and the closing sleep.
pub struct NodeRunner<T: Transport> {
    chain: ChainState,
    transport: T,
    probe: ActProbe,
    iteration: Duration,
}

impl<T: Transport> NodeRunner<T> {
    /// Wire a chain replica to a transport and fire its startup actions
    /// (the genesis DISCOVER).
    pub fn new(
        chain: ChainState,
        startup_actions: Vec<ChainAction>,
        transport: T,
        probe: ActProbe,
        iteration: Duration,
    ) -> Self {
        let mut runner = NodeRunner {
            chain,
            transport,
            probe,
            iteration,
        };
        runner.execute(startup_actions);
        runner
    }

    /// Run forever. The process is expected to be killed externally.
    pub fn run(mut self) {
        loop {
            let start = Instant::now();
            self.run_iteration();

            if let Some(remaining) = self.iteration.checked_sub(start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// One loop iteration without the closing sleep. Tests and the
    /// simulation harness drive this directly.
    pub fn run_iteration(&mut self) {
        let start = Instant::now();

        self.listen();
        self.chain.reconcile();

        let budget = self.iteration.saturating_sub(start.elapsed());
        let actions = self.chain.try_seal(budget);
        self.execute(actions);

        if let Some(vote) = self.probe.poll() {
            self.submit_vote(vote);
        }

        let status = self.chain.status();
        debug!(
            node = %self.chain.node_id(),
            attached = status.attached,
            pending = status.pending,
            queued = status.queued,
            staged_votes = status.staged_votes,
            "iteration status"
        );
    }

    /// Cast a vote originating on this node: staged locally and broadcast
    /// as an ACT transaction.
    pub fn submit_vote(&mut self, vote: Action) {
        let actions = self.chain.handle(ChainEvent::VoteSubmitted { vote });
        self.execute(actions);
    }

    /// Read access to the replica, for inspection after (or between) runs.
    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    /// Drain the transport without blocking.
    fn listen(&mut self) {
        while let Some((bytes, from)) = self.transport.recv() {
            let transaction = match decode(&bytes) {
                Ok(transaction) => transaction,
                Err(error) => {
                    debug!(peer = %from, %error, "dropping undecodable datagram");
                    continue;
                }
            };

            let actions = self.chain.handle(ChainEvent::TransactionReceived {
                from,
                transaction,
            });
            self.execute(actions);
        }
    }

    /// Perform the chain's requested I/O. Transport refusals are ignored:
    /// the protocol is built on a best-effort network.
    fn execute(&mut self, actions: Vec<ChainAction>) {
        for action in actions {
            trace!(action = action.type_name(), "executing chain action");
            match action {
                ChainAction::Send { to, transaction } => {
                    self.transport.send(&encode(&transaction), to);
                }
                ChainAction::Broadcast { transaction } => {
                    self.transport.broadcast(&encode(&transaction));
                }
            }
        }
    }
}
