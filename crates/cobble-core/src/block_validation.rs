//! Full block validation with intra-block UTXO progression.
//!
//! [`validate_block`] checks header linkage, timestamp drift, the merkle
//! commitment, proof-of-work, and then walks the transactions over a
//! working copy of the UTXO set. Spends look up the working copy, so a
//! child transaction may spend a parent's output when the parent appears
//! earlier in the same block. On success the updated copy is returned for
//! atomic commit; on any failure the live set is untouched.
//!
//! The genesis block is constructed locally by the store and does not pass
//! through this module.

use std::collections::HashMap;

use crate::compact;
use crate::constants::MAX_FUTURE_DRIFT_MS;
use crate::error::{BlockError, TxError};
use crate::merkle;
use crate::params::ChainParams;
use crate::reward;
use crate::types::{Block, Outpoint, UtxoEntry};
use crate::validation;

/// Chain context for validating one block.
#[derive(Debug, Clone)]
pub struct BlockContext<'a> {
    /// The current tip, or `None` for an empty chain (genesis expected).
    pub tip: Option<&'a Block>,
    /// Wall-clock time in milliseconds, for the future-drift bound.
    pub now_ms: u64,
}

/// Result of a successful block validation.
#[derive(Debug, Clone)]
pub struct AppliedBlock {
    /// Sum of all non-coinbase transaction fees.
    pub total_fees: u64,
    /// Total value of the coinbase outputs.
    pub coinbase_value: u64,
    /// The UTXO set after applying the block, ready to commit.
    pub utxo: HashMap<Outpoint, UtxoEntry>,
}

/// Validate a block against the chain tip and UTXO set.
///
/// Implements the stateful rule set of the consensus node: index and
/// previous-hash linkage, the two-hour future-timestamp bound, merkle root
/// recomputation from transaction content (supplied `id` fields are
/// ignored), proof-of-work against the block's own `bits`, exactly one
/// coinbase at position 0, per-transaction validation over the working
/// UTXO copy with maturity measured at `block.index`, and the coinbase
/// reward bound `subsidy(index) + fees`.
pub fn validate_block(
    block: &Block,
    context: &BlockContext<'_>,
    utxo: &HashMap<Outpoint, UtxoEntry>,
    params: &ChainParams,
) -> Result<AppliedBlock, BlockError> {
    // --- Header linkage ---

    match context.tip {
        None => {
            if block.index != 0 {
                return Err(BlockError::UnexpectedIndex {
                    got: block.index,
                    expected: 0,
                });
            }
        }
        Some(tip) => {
            if block.index != tip.index + 1 {
                return Err(BlockError::UnexpectedIndex {
                    got: block.index,
                    expected: tip.index + 1,
                });
            }
            if block.previous_hash != tip.header_hash() {
                return Err(BlockError::PreviousHashMismatch);
            }
        }
    }

    // --- Timestamp ---

    if block.timestamp > context.now_ms.saturating_add(MAX_FUTURE_DRIFT_MS) {
        return Err(BlockError::TimestampTooFar);
    }

    // --- Merkle commitment (ids recomputed from content) ---

    let mut ids = Vec::with_capacity(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        let id = tx
            .compute_id()
            .map_err(|source| BlockError::Tx { index: i, source })?;
        ids.push(id);
    }
    if merkle::merkle_root(&ids) != block.merkle_root {
        return Err(BlockError::MerkleMismatch);
    }

    // --- Proof of work ---

    if !compact::hash_meets_bits(&block.header_hash(), block.bits) {
        return Err(BlockError::InsufficientPow);
    }

    // --- Transactions over a working UTXO copy ---

    if block.transactions.is_empty() || !block.transactions[0].coinbase {
        return Err(if block.transactions.iter().any(|tx| tx.coinbase) {
            BlockError::FirstTxNotCoinbase
        } else {
            BlockError::MissingCoinbase
        });
    }

    let mut working = utxo.clone();
    let mut coinbase_count = 0usize;
    let mut total_fees: u64 = 0;

    for (i, tx) in block.transactions.iter().enumerate() {
        if tx.coinbase {
            coinbase_count += 1;
            if coinbase_count > 1 {
                return Err(BlockError::MultipleCoinbase);
            }
        }

        let validated =
            validation::validate_transaction(tx, |op| working.get(op).cloned(), block.index, params)
                .map_err(|source| BlockError::Tx { index: i, source })?;

        total_fees = total_fees
            .checked_add(validated.fee)
            .ok_or(BlockError::Tx {
                index: i,
                source: TxError::ValueOverflow,
            })?;

        for input in &tx.inputs {
            working.remove(&input.outpoint());
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            working.insert(
                Outpoint {
                    txid: ids[i].clone(),
                    index: vout as u32,
                },
                UtxoEntry {
                    amount: output.amount,
                    address: output.address.clone(),
                    block_height: block.index,
                    is_coinbase: tx.coinbase,
                },
            );
        }
    }

    // --- Coinbase reward bound ---

    let coinbase_value = block.transactions[0]
        .total_output()
        .ok_or(BlockError::Tx {
            index: 0,
            source: TxError::ValueOverflow,
        })?;
    let max_reward = reward::subsidy(block.index, params)
        .checked_add(total_fees)
        .ok_or(BlockError::Tx {
            index: 0,
            source: TxError::ValueOverflow,
        })?;
    if coinbase_value > max_reward {
        return Err(BlockError::CoinbaseOverpays {
            got: coinbase_value,
            max: max_reward,
        });
    }

    Ok(AppliedBlock {
        total_fees,
        coinbase_value,
        utxo: working,
    })
}
