//! Cinder node binary.
//!
//! Starts a node serving the WebSocket gossip endpoint and the admin HTTP
//! API, optionally seeded with a persisted chain dump. SIGTERM or Ctrl-C
//! stops the node cleanly.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cinder::chain::Blockchain;
use cinder::config::ChainConfig;
use cinder::node::{Node, NodeConfig};

/// Cinder peer-to-peer cryptocurrency node.
#[derive(Parser, Debug)]
#[command(name = "cinder", version, about = "Cinder peer-to-peer cryptocurrency node")]
struct Cli {
    /// Node name used in log output.
    #[arg(long, default_value = "cinder")]
    name: String,

    /// WebSocket (gossip) listen host.
    #[arg(long, default_value = "127.0.0.1")]
    websocket_host: String,

    /// WebSocket (gossip) listen port.
    #[arg(long, default_value_t = cinder::constants::DEFAULT_WEBSOCKET_PORT)]
    websocket_port: u16,

    /// Admin HTTP listen host.
    #[arg(long, default_value = "127.0.0.1")]
    http_host: String,

    /// Admin HTTP listen port.
    #[arg(long, default_value_t = cinder::constants::DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// Persisted blockchain dump (JSON) to load at startup.
    #[arg(long)]
    blockchain: Option<PathBuf>,

    /// Configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose log output.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let chain_config = match &cli.config {
        Some(path) => ChainConfig::load(path)?,
        None => ChainConfig::default(),
    };

    // A persisted chain is fully re-validated on load; a dump that fails
    // replay aborts startup.
    let initial_chain = match &cli.blockchain {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to open blockchain file: {e}"))?;
            let value: serde_json::Value = serde_json::from_str(&contents)
                .map_err(|e| format!("failed to parse blockchain file: {e}"))?;
            let chain = Blockchain::from_json(chain_config.clone(), &value)?;
            tracing::info!(path = %path.display(), blocks = chain.len(), "Loaded blockchain");
            Some(chain)
        }
        None => None,
    };

    let node = Node::new(
        NodeConfig {
            name: cli.name,
            websocket_host: cli.websocket_host,
            websocket_port: cli.websocket_port,
            http_host: cli.http_host,
            http_port: cli.http_port,
            chain: chain_config,
        },
        initial_chain,
    );

    // First termination signal stops the node; the handler then retires.
    let signal_node = node.clone();
    tokio::spawn(async move {
        let terminated = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = terminated => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        signal_node.stop();
    });

    node.run().await?;
    Ok(())
}
