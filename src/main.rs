//! Vesper devnet binary.
//!
//! Spins up a local permissioned network of in-process validator nodes
//! wired through the broadcast hub, then runs their duty cycles until
//! Ctrl-C. Useful for watching the beacon and block production interleave:
//!
//!   vesper                       # 4 nodes, 3s ticks
//!   vesper --nodes 7 --tick-secs 1
//!   RUST_LOG=vesper=debug vesper

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;

use vesper::config::VesperConfig;
use vesper::crypto::keys::SigningKeypair;
use vesper::dag::Dag;
use vesper::mempool::Mempool;
use vesper::network::{LocalHub, NodeId};
use vesper::node::Node;

/// Vesper permissioned DAG proof-of-stake devnet.
#[derive(Parser, Debug)]
#[command(name = "vesper", version, about = "Vesper consensus devnet")]
struct Cli {
    /// Data directory (searched for vesper.toml).
    #[arg(long, default_value = "./vesper-data")]
    data_dir: PathBuf,

    /// Number of in-process validator nodes.
    #[arg(long)]
    nodes: Option<usize>,

    /// Unix seconds of slot 0 (defaults to startup time).
    #[arg(long)]
    genesis_time: Option<u64>,

    /// Duty-cycle tick period in seconds.
    #[arg(long)]
    tick_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = VesperConfig::load(&cli.data_dir);

    let node_count = cli.nodes.unwrap_or(config.devnet.nodes).max(1);
    let tick_secs = cli.tick_secs.unwrap_or(config.devnet.tick_secs).max(1);
    let genesis_time = cli
        .genesis_time
        .or(config.devnet.genesis_time)
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

    let keypairs: Vec<SigningKeypair> =
        (0..node_count).map(|_| SigningKeypair::generate()).collect();
    let validators: Vec<_> = keypairs.iter().map(|kp| kp.public.clone()).collect();

    tracing::info!(
        nodes = node_count,
        genesis_time,
        tick_secs,
        "starting Vesper devnet"
    );
    for (i, key) in validators.iter().enumerate() {
        tracing::info!(
            node = %NodeId(i as u32),
            validator = %hex::encode(&key.fingerprint()[..8]),
            "registered validator"
        );
    }

    let hub = Arc::new(LocalHub::new());
    for (i, keypair) in keypairs.into_iter().enumerate() {
        let node_id = NodeId(i as u32);
        let inbox = hub.register(node_id);
        let dag = Dag::new(genesis_time, validators.clone());
        let mut node = Node::new(node_id, keypair, dag, Mempool::with_defaults(), Arc::clone(&hub));
        tokio::spawn(async move {
            node.run(inbox, Duration::from_secs(tick_secs)).await;
        });
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
