//! Pollchain node.
//!
//! Runs one voting-chain replica over UDP broadcast until killed.
//!
//! # Usage
//!
//! ```bash
//! # All defaults: channel 0, port 12345, `act` file probed in the cwd
//! pollchain-node
//!
//! # Start from a configuration file, overriding the channel
//! pollchain-node --config node.toml --channel 2
//! ```
//!
//! Dropping a file named `act` (first byte = vote symbol) into the working
//! directory casts one vote.

use anyhow::{Context, Result};
use clap::Parser;
use pollchain_chain::ChainState;
use pollchain_node::{ActProbe, NodeConfig, NodeRunner};
use pollchain_pow::Sealer;
use pollchain_transport::UdpTransport;
use pollchain_types::{Channel, NodeId};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pollchain voting node.
#[derive(Parser, Debug)]
#[command(name = "pollchain-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node identifier for log attribution (overrides config)
    #[arg(long)]
    node_id: Option<u32>,

    /// Chain channel to join (overrides config)
    #[arg(long)]
    channel: Option<u16>,

    /// Shared UDP protocol port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Path probed for act requests (overrides config)
    #[arg(long)]
    act_file: Option<PathBuf>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn apply_overrides(config: &mut NodeConfig, cli: &Cli) {
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref act_file) = cli.act_file {
        config.act_path = act_file.clone();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = match cli.config {
        Some(ref path) => NodeConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    apply_overrides(&mut config, &cli);

    info!(
        node_id = config.node_id,
        channel = config.channel,
        port = config.port,
        "starting pollchain node"
    );

    let transport = UdpTransport::bind(config.port)
        .with_context(|| format!("binding UDP port {}", config.port))?;

    let sealer = match config.seal_seed {
        Some(seed) => Sealer::new(seed),
        None => Sealer::from_entropy(),
    };

    let (chain, startup_actions) =
        ChainState::new(NodeId(config.node_id), Channel(config.channel), sealer);

    let runner = NodeRunner::new(
        chain,
        startup_actions,
        transport,
        ActProbe::new(config.act_path),
        Duration::from_millis(config.iteration_ms),
    );

    // Runs until the process is killed; there is no other exit path.
    runner.run();
    Ok(())
}
