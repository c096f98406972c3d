//! Cobble full node binary.
//!
//! Starts a node with file-per-block storage, the HTTP ingress API, and
//! the peer gossip listener. Configuration comes from CLI flags with
//! environment fallbacks (`COBBLE_HTTP_PORT`, `COBBLE_P2P_PORT`,
//! `COBBLE_PEERS` as a JSON array of WebSocket URLs, `COBBLE_DATA_DIR`).
//! Exits 0 on clean shutdown and nonzero on unrecoverable startup
//! failure (corrupted block directory or config).

use std::path::PathBuf;
use std::process;

use clap::Parser;
use cobble_node_lib::{Node, NodeConfig, http};
use tracing::{error, info};

/// Cobble full node.
#[derive(Parser, Debug)]
#[command(
    name = "cobble-node",
    version,
    about = "Cobble full node with file-backed storage, HTTP API, and peer gossip"
)]
struct Args {
    /// Data directory for block files and config
    #[arg(long, env = "COBBLE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API bind address
    #[arg(long, default_value = "127.0.0.1")]
    http_bind: String,

    /// HTTP API port
    #[arg(long, env = "COBBLE_HTTP_PORT", default_value_t = cobble_core::constants::DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// Peer-protocol listen address
    #[arg(long, default_value = "0.0.0.0")]
    p2p_bind: String,

    /// Peer-protocol listen port
    #[arg(long, env = "COBBLE_P2P_PORT", default_value_t = cobble_core::constants::DEFAULT_P2P_PORT)]
    p2p_port: u16,

    /// Seed peers as a JSON array of WebSocket URLs, e.g. '["ws://10.0.0.2:6001"]'
    #[arg(long, env = "COBBLE_PEERS", default_value = "[]")]
    peers: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Disable peer networking (single-node mode)
    #[arg(long)]
    no_network: bool,
}

impl Args {
    fn into_config(self) -> Result<(NodeConfig, String, bool), String> {
        let peers: Vec<String> = serde_json::from_str(&self.peers)
            .map_err(|e| format!("COBBLE_PEERS must be a JSON array of URLs: {e}"))?;

        let data_dir = self.data_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cobble")
        });

        let config = NodeConfig {
            data_dir,
            http_bind: self.http_bind,
            http_port: self.http_port,
            network: cobble_network::NetworkConfig {
                listen_addr: self.p2p_bind,
                listen_port: self.p2p_port,
                peers,
            },
            log_level: self.log_level,
        };
        Ok((config, self.log_format, self.no_network))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format, no_network) = match args.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("Cobble Node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("http_addr: {}", config.http_addr());

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {e}");
        process::exit(1);
    }

    // Peer networking first, so the node can be handed the gossip handle.
    let mut gossip = None;
    let mut events = None;
    if !no_network {
        match cobble_network::start(config.network.clone()).await {
            Ok((handle, event_rx)) => {
                info!("peer listener on {}", handle.local_addr());
                info!("seed peers: {:?}", config.network.peers);
                gossip = Some(handle);
                events = Some(event_rx);
            }
            Err(e) => {
                error!("failed to start peer networking: {e}");
                process::exit(1);
            }
        }
    }

    let node = match Node::new(&config, gossip) {
        Ok(node) => node,
        Err(e) => {
            error!("failed to start node: {e}");
            process::exit(1);
        }
    };
    info!("chain tip at height {}", node.tip_height());

    if let Some(events) = events {
        let gossip_node = node.clone();
        tokio::spawn(gossip_node.run(events));
    }

    let listener = match tokio::net::TcpListener::bind(config.http_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind HTTP listener on {}: {e}", config.http_addr());
            process::exit(1);
        }
    };
    info!("HTTP API listening on {}", config.http_addr());

    let server = axum::serve(listener, http::router(node)).with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    });
    if let Err(e) = server.await {
        error!("HTTP server error: {e}");
        process::exit(1);
    }

    info!("cobble-node shutdown complete");
}

/// Initialize the tracing subscriber.
///
/// `format = "json"` selects structured output for log pipelines; any
/// other value means human-readable text. `RUST_LOG` overrides the
/// configured level.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
