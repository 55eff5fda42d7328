//! Multi-node simulation on the in-memory hub.
//!
//! Spawns N replicas in one process, one OS thread per node, feeds a vote
//! script to the first one, and reports every node's longest-chain tip and
//! winner. Useful for watching convergence without touching a real network.
//!
//! ```bash
//! pollchain-sim --nodes 3 --votes AAAB --rounds 30
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pollchain_chain::ChainState;
use pollchain_node::{ActProbe, NodeRunner};
use pollchain_pow::Sealer;
use pollchain_transport::{MemoryHub, MemoryTransport};
use pollchain_types::{Action, Channel, NodeId, BLOCK_VOTES};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pollchain in-memory simulation.
#[derive(Parser, Debug)]
#[command(name = "pollchain-sim")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of replicas on the hub
    #[arg(long, default_value_t = 3)]
    nodes: u32,

    /// Vote symbols cast on node 0; each symbol is repeated to fill one
    /// block
    #[arg(long, default_value = "A")]
    votes: String,

    /// Rounds to run; every node completes a round before any node starts
    /// the next
    #[arg(long, default_value_t = 30)]
    rounds: u32,

    /// Probability that any delivery is dropped (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Seed for the packet-loss decision stream
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let hub = MemoryHub::with_packet_loss(cli.loss, cli.seed);
    let channel = Channel(0);

    // Register every endpoint before any runner fires its startup
    // DISCOVER, so no node misses another's announcement.
    let transports: Vec<MemoryTransport> = (0..cli.nodes).map(|_| hub.endpoint()).collect();

    let runners: Vec<NodeRunner<MemoryTransport>> = transports
        .into_iter()
        .enumerate()
        .map(|(id, transport)| {
            let (chain, startup_actions) = ChainState::new(
                NodeId(id as u32),
                channel,
                Sealer::new(cli.seed.wrapping_add(id as u64)),
            );
            NodeRunner::new(
                chain,
                startup_actions,
                transport,
                // No filesystem probing in the simulation; votes are
                // scripted below.
                ActProbe::new(format!("/nonexistent/pollchain-sim-{id}")),
                Duration::from_secs(5),
            )
        })
        .collect();

    info!(nodes = cli.nodes, rounds = cli.rounds, loss = cli.loss, "simulation starting");

    // One full block per scripted symbol, all cast on node 0.
    let scripted_votes: Vec<Action> = cli
        .votes
        .bytes()
        .flat_map(|symbol| std::iter::repeat(Action(symbol)).take(BLOCK_VOTES))
        .collect();

    // One thread per node; a barrier keeps the rounds aligned so every
    // node finishes round N before any node starts round N + 1.
    let barrier = Arc::new(Barrier::new(cli.nodes as usize));
    let rounds = cli.rounds;

    let mut handles = Vec::new();
    for (id, mut runner) in runners.into_iter().enumerate() {
        let barrier = barrier.clone();
        let mut votes = if id == 0 {
            scripted_votes.clone().into_iter()
        } else {
            Vec::new().into_iter()
        };

        let handle = thread::Builder::new()
            .name(format!("node-{id}"))
            .spawn(move || {
                for round in 0..rounds {
                    if let Some(vote) = votes.next() {
                        runner.submit_vote(vote);
                    }

                    runner.run_iteration();

                    if id == 0 {
                        info!(round, "completed round");
                    }
                    barrier.wait();
                }
                runner
            })
            .with_context(|| format!("spawning thread for node {id}"))?;
        handles.push(handle);
    }

    for handle in handles {
        let runner = handle
            .join()
            .map_err(|_| anyhow!("a node thread panicked"))?;
        let chain = runner.chain();
        let status = chain.status();
        println!(
            "node {}: tip {} winner '{}' (attached {}, pending {})",
            chain.node_id(),
            chain.tip_hash(),
            chain.winner(),
            status.attached,
            status.pending,
        );
    }

    Ok(())
}
