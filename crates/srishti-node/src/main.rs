//! srishti-node — the Srishti full-node binary.
//!
//! Startup sequence:
//!   1. Load or generate the node identity
//!   2. Open (or initialise) the state database, applying genesis if fresh
//!   3. Join the in-process relay hub
//!   4. Start the JSON-RPC 2.0 server
//!   5. Run the node's single cooperative event loop until Ctrl-C

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use srishti_net::{InProcessHub, RelayChannel};
use srishti_node::{GenesisFileParams, GenesisToken, Node, NodeIdentity, SrishtiConfig};
use srishti_rpc::{RpcServer, RpcServerState};

#[derive(Parser, Debug)]
#[command(
    name = "srishti-node",
    version,
    about = "Srishti node — a permissionless replicated ledger of identity, reputation, and governance events"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.srishti/data")]
    data_dir: PathBuf,

    /// Path to the node identity file, generated on first run.
    #[arg(long, default_value = "~/.srishti/identity.json")]
    identity: PathBuf,

    /// Display name recorded in this node's `NODE_JOIN` event.
    #[arg(long, default_value = "node")]
    name: String,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8645")]
    rpc_addr: SocketAddr,

    /// Path to an optional `SrishtiConfig` JSON file overriding timing defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh node identity and exit, without starting the node.
    Keygen,

    /// Run the node.
    Run {
        /// Path to a `chainEpoch`/`token` genesis params JSON file. Required
        /// only when bootstrapping a brand-new network; a node joining an
        /// existing one via gossip/sync never needs this.
        #[arg(long)]
        genesis_params: Option<PathBuf>,

        /// The chain epoch this node expects, used when `--genesis-params`
        /// is not given (joining an existing network).
        #[arg(long, default_value_t = 1)]
        chain_epoch: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,srishti=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let identity_path = expand_tilde(&args.identity);

    match args.command {
        Command::Keygen => cmd_keygen(&identity_path, &args.name),
        Command::Run { genesis_params, chain_epoch } => {
            run_node(args.data_dir, identity_path, args.name, args.rpc_addr, args.config, genesis_params, chain_epoch).await
        }
    }
}

fn cmd_keygen(identity_path: &Path, name: &str) -> anyhow::Result<()> {
    if identity_path.exists() {
        bail!(
            "identity file {} already exists. Delete it first to generate a new one.",
            identity_path.display()
        );
    }
    let identity = NodeIdentity::load_or_generate(identity_path, name)
        .context("generating node identity")?;
    println!("Generated new node identity.");
    println!("Node id:  {}", identity.node_id());
    println!("Identity: {}", identity_path.display());
    println!("\nBACK UP YOUR IDENTITY FILE AND RECOVERY PHRASE.");
    Ok(())
}

async fn run_node(
    data_dir: PathBuf,
    identity_path: PathBuf,
    name: String,
    rpc_addr: SocketAddr,
    config_path: Option<PathBuf>,
    genesis_params: Option<PathBuf>,
    cli_chain_epoch: u64,
) -> anyhow::Result<()> {
    info!("srishti-node starting");

    let data_dir = expand_tilde(&data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let identity =
        NodeIdentity::load_or_generate(&identity_path, &name).context("loading node identity")?;

    let config = SrishtiConfig::load(config_path.as_deref()).context("loading node config")?;

    let genesis = genesis_params
        .as_deref()
        .map(load_genesis_token)
        .transpose()?;
    let chain_epoch = genesis.as_ref().map(|g| g.chain_epoch).unwrap_or(cli_chain_epoch);

    let hub = InProcessHub::new();
    let (relay, relay_rx) = hub.join(identity.node_id().clone());
    let relay: Arc<dyn RelayChannel> = Arc::new(relay);

    let node = Node::bootstrap(&data_dir, identity, chain_epoch, genesis, config, relay)
        .context("bootstrapping node")?;
    let chain = Arc::clone(&node.chain);

    let (local_tx, local_rx) = mpsc::channel(256);
    let rpc_state = Arc::new(RpcServerState {
        chain,
        event_sender: Some(local_tx),
    });
    let _rpc_handle = RpcServer::new(rpc_state)
        .start(rpc_addr)
        .await
        .context("starting RPC server")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    info!("node ready");
    node.run(relay_rx, local_rx, shutdown_rx).await?;
    Ok(())
}

fn load_genesis_token(path: &Path) -> anyhow::Result<GenesisToken> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading genesis params from {}", path.display()))?;
    let params: GenesisFileParams =
        serde_json::from_str(&json).context("parsing genesis params JSON")?;
    Ok(GenesisToken {
        chain_epoch: params.chain_epoch,
        token: params.token,
    })
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
