//! Block candidate assembly for miners.
//!
//! A candidate is a fully-formed block with `nonce = 0`: the miner's only
//! job is the nonce search. Transactions are taken from the mempool in
//! admission order; fees are computed against the current UTXO set, and
//! the coinbase pays `subsidy(index) + fees` to the miner.

use crate::error::TxError;
use crate::merkle;
use crate::params::ChainParams;
use crate::reward;
use crate::types::{Block, Outpoint, Transaction, TxOutput, UtxoEntry};

/// Assemble an unsolved block extending `tip`.
///
/// `pool` is a mempool snapshot in admission order, already capped by the
/// caller or longer (at most `max_block_tx` entries are taken). Entries
/// whose inputs are no longer present in the UTXO set are skipped. Every
/// transaction id is recomputed and the merkle root covers the final list.
pub fn build_candidate<F>(
    miner_address: &str,
    tip: &Block,
    params: &ChainParams,
    pool: &[Transaction],
    get_utxo: F,
    now_ms: u64,
) -> Result<Block, TxError>
where
    F: Fn(&Outpoint) -> Option<UtxoEntry>,
{
    let index = tip.index + 1;

    let mut selected: Vec<Transaction> = Vec::new();
    let mut total_fees: u64 = 0;

    for tx in pool.iter().take(params.max_block_tx) {
        let Some(fee) = fee_against_utxo(tx, &get_utxo) else {
            // Stale entry: an input vanished since admission.
            continue;
        };
        let mut tx = tx.clone();
        tx.id = tx.compute_id()?;
        total_fees = total_fees.checked_add(fee).ok_or(TxError::ValueOverflow)?;
        selected.push(tx);
    }

    let reward = reward::subsidy(index, params)
        .checked_add(total_fees)
        .ok_or(TxError::ValueOverflow)?;

    let mut coinbase = Transaction {
        id: String::new(),
        coinbase: true,
        inputs: vec![],
        outputs: vec![TxOutput {
            address: miner_address.to_string(),
            amount: reward,
        }],
    };
    coinbase.id = coinbase.compute_id()?;

    let mut transactions = Vec::with_capacity(selected.len() + 1);
    transactions.push(coinbase);
    transactions.extend(selected);

    let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();

    Ok(Block {
        index,
        previous_hash: tip.header_hash(),
        timestamp: now_ms,
        merkle_root: merkle::merkle_root(&ids),
        nonce: 0,
        bits: params.bits,
        transactions,
    })
}

/// Fee of `tx` against the supplied UTXO view, or `None` when an input is
/// missing or arithmetic overflows.
fn fee_against_utxo<F>(tx: &Transaction, get_utxo: &F) -> Option<u64>
where
    F: Fn(&Outpoint) -> Option<UtxoEntry>,
{
    let mut total_in: u64 = 0;
    for input in &tx.inputs {
        total_in = total_in.checked_add(get_utxo(&input.outpoint())?.amount)?;
    }
    total_in.checked_sub(tx.total_output()?)
}
