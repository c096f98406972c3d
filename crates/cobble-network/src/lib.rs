//! # cobble-network
//! Peer gossip for Cobble: a full-duplex, JSON-framed message protocol
//! over WebSockets, with deduplicated flooding driven by the node layer.

pub mod config;
pub mod protocol;
pub mod service;

pub use config::NetworkConfig;
pub use protocol::PeerMessage;
pub use service::{GossipHandle, NetworkEvent, PeerId, start};
