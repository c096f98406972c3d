//! Genesis block construction.
//!
//! Height 0 is built locally by every node from fixed constants and the
//! deployment's chain parameters, so all nodes on a network share the same
//! genesis without exchanging it. The genesis coinbase pays amount 0 to
//! the literal address `"genesis"` and is appended without validation.

use crate::error::TxError;
use crate::merkle;
use crate::params::ChainParams;
use crate::types::{Block, Transaction, TxOutput};

/// Fixed genesis timestamp: 2025-01-01T00:00:00Z in milliseconds.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_735_689_600_000;

/// The address named in the genesis coinbase output.
pub const GENESIS_ADDRESS: &str = "genesis";

/// Build the genesis block for the given chain parameters.
///
/// `previousHash` is the literal `"0"`; bits come from the configured
/// starting difficulty; the nonce stays 0 (genesis is not mined).
pub fn genesis_block(params: &ChainParams) -> Result<Block, TxError> {
    let mut coinbase = Transaction {
        id: String::new(),
        coinbase: true,
        inputs: vec![],
        outputs: vec![TxOutput {
            address: GENESIS_ADDRESS.to_string(),
            amount: 0,
        }],
    };
    coinbase.id = coinbase.compute_id()?;
    let merkle_root = merkle::merkle_root(&[coinbase.id.clone()]);

    Ok(Block {
        index: 0,
        previous_hash: "0".to_string(),
        timestamp: GENESIS_TIMESTAMP_MS,
        merkle_root,
        nonce: 0,
        bits: params.bits,
        transactions: vec![coinbase],
    })
}
