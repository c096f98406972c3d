//! Node configuration.
//!
//! Runtime knobs come from the environment (or CLI flags in the binary):
//! HTTP listen port, peer-protocol port, an optional JSON array of peer
//! URLs, and the data directory. Chain parameters live separately in the
//! persisted `config.json` (see [`ChainParams`](cobble_core::params::ChainParams)).

use std::path::PathBuf;

use cobble_core::constants::DEFAULT_HTTP_PORT;
use cobble_network::NetworkConfig;

/// Configuration for a full node instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Root directory for the block files and `config.json`.
    pub data_dir: PathBuf,
    /// Address the HTTP API binds to.
    pub http_bind: String,
    /// Port the HTTP API binds to.
    pub http_port: u16,
    /// Peer gossip configuration.
    pub network: NetworkConfig,
    /// Log level filter string (e.g. "info", "cobble_node_lib=debug").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cobble");

        Self {
            data_dir,
            http_bind: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            network: NetworkConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Socket address string for the HTTP server.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_bind, self.http_port)
    }
}
