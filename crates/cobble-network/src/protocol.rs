//! Wire messages for the Cobble peer protocol.
//!
//! Every frame is one JSON text message with a `type` tag:
//!
//! - `{"type":"tx","tx":…}` — transaction announcement
//! - `{"type":"block","block":…}` — block announcement
//! - `{"type":"get_tip"}` / `{"type":"tip","tip":…}` — tip exchange
//!
//! Malformed frames decode to `None` and are dropped by the service; a
//! peer is never disconnected for sending garbage.

use serde::{Deserialize, Serialize};

use cobble_core::types::{Block, Transaction};

/// A message exchanged between Cobble peers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// A transaction announcement.
    Tx { tx: Transaction },
    /// A block announcement.
    Block { block: Block },
    /// Request the remote peer's chain tip.
    GetTip,
    /// The responding peer's tip (`null` before genesis exists).
    Tip { tip: Option<Block> },
}

impl PeerMessage {
    /// Encode this message as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a JSON text frame. Returns `None` for anything malformed.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
