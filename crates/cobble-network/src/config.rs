//! Network configuration.

use std::time::Duration;

use cobble_core::constants::DEFAULT_P2P_PORT;

/// Delay between reconnection attempts to a lost outbound peer.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the gossip service.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// Port the WebSocket listener binds to. 0 picks an ephemeral port.
    pub listen_port: u16,
    /// Seed peers to dial, as WebSocket URLs (`ws://host:port`).
    pub peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: DEFAULT_P2P_PORT,
            peers: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Socket address string for the listener.
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}
