//! # cobble-node-lib
//! Full node composition for Cobble: chain store, node state machine,
//! and the HTTP ingress API.

pub mod config;
pub mod http;
pub mod node;
pub mod store;

pub use config::NodeConfig;
pub use node::Node;
pub use store::ChainStore;
