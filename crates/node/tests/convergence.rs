//! Multi-node convergence over the in-memory hub.
//!
//! These drive full runners (chain + codec + transport) with interleaved
//! iterations in a single thread, so delivery order is deterministic and
//! the convergence assertions are exact rather than probabilistic.

use pollchain_chain::ChainState;
use pollchain_node::{ActProbe, NodeRunner};
use pollchain_pow::Sealer;
use pollchain_transport::{MemoryHub, MemoryTransport};
use pollchain_types::{Action, Channel, NodeId, BLOCK_VOTES};
use std::time::Duration;
use tracing_test::traced_test;

const CHANNEL: Channel = Channel(0);

fn make_runner(
    id: u32,
    transport: MemoryTransport,
) -> NodeRunner<MemoryTransport> {
    let (chain, startup_actions) =
        ChainState::new(NodeId(id), CHANNEL, Sealer::new(1000 + id as u64));
    NodeRunner::new(
        chain,
        startup_actions,
        transport,
        ActProbe::new(format!("/nonexistent/pollchain-test-{id}")),
        // Generous budget so a seal completes within one iteration.
        Duration::from_secs(120),
    )
}

#[test]
#[traced_test]
fn single_voter_tips_converge() {
    let hub = MemoryHub::new();
    // Register both endpoints before any runner broadcasts its DISCOVER.
    let transport_a = hub.endpoint();
    let transport_b = hub.endpoint();

    let mut node_a = make_runner(0, transport_a);
    let mut node_b = make_runner(1, transport_b);

    for _ in 0..BLOCK_VOTES {
        node_a.submit_vote(Action(b'A'));
    }

    // A seals and notifies; B attaches on its next drain.
    for _ in 0..3 {
        node_a.run_iteration();
        node_b.run_iteration();
    }

    assert_eq!(node_a.chain().status().attached, 2);
    assert_eq!(node_b.chain().status().attached, 2);
    assert_eq!(node_a.chain().tip_hash(), node_b.chain().tip_hash());
    assert_eq!(node_a.chain().winner(), Action(b'A'));
    assert_eq!(node_b.chain().winner(), Action(b'A'));
}

#[test]
fn late_joiner_catches_up_through_discover() {
    let hub = MemoryHub::new();
    let transport_a = hub.endpoint();

    let mut node_a = make_runner(0, transport_a);
    for _ in 0..BLOCK_VOTES {
        node_a.submit_vote(Action(b'B'));
    }
    node_a.run_iteration();
    assert_eq!(node_a.chain().status().attached, 2);

    // B joins after the fact; its startup DISCOVER asks A for the chain.
    let transport_b = hub.endpoint();
    let mut node_b = make_runner(1, transport_b);

    for _ in 0..3 {
        node_a.run_iteration();
        node_b.run_iteration();
    }

    assert_eq!(node_b.chain().status().attached, 2);
    assert_eq!(node_b.chain().tip_hash(), node_a.chain().tip_hash());
    assert_eq!(node_b.chain().winner(), Action(b'B'));
}

#[test]
fn remote_votes_fill_a_remote_block() {
    let hub = MemoryHub::new();
    let transport_a = hub.endpoint();
    let transport_b = hub.endpoint();

    let mut node_a = make_runner(0, transport_a);
    let mut node_b = make_runner(1, transport_b);

    // Settle the startup DISCOVER exchange first so the ACT broadcasts
    // below are the only traffic in flight.
    node_a.run_iteration();
    node_b.run_iteration();

    // Votes cast on A reach B as ACT transactions; both stage them, so
    // both nodes fill and queue a block off the same parent.
    for _ in 0..BLOCK_VOTES - 1 {
        node_a.submit_vote(Action(b'C'));
    }
    node_b.run_iteration();
    assert_eq!(node_b.chain().status().staged_votes, BLOCK_VOTES - 1);

    // The 24th vote fills B's staging block and B's next iteration seals
    // it straight away, racing A's own queued copy for the parent slot.
    node_a.submit_vote(Action(b'C'));
    node_b.run_iteration();
    assert_eq!(node_b.chain().status().staged_votes, 0);
    assert_eq!(node_b.chain().status().attached, 2);

    // A hears B's NOTIFY_SIGNED first, so A's queued block is replaced and
    // discarded unsigned. Tips must still converge.
    for _ in 0..4 {
        node_a.run_iteration();
        node_b.run_iteration();
    }

    assert_eq!(node_a.chain().status().attached, 2);
    assert_eq!(node_a.chain().status().queued, 0);
    assert_eq!(node_a.chain().tip_hash(), node_b.chain().tip_hash());
    assert_eq!(node_a.chain().winner(), Action(b'C'));
    assert_eq!(node_b.chain().winner(), Action(b'C'));
}
