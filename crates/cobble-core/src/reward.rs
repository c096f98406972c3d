//! Coinbase subsidy schedule.
//!
//! The subsidy starts at `block_subsidy` and halves every
//! `halving_interval` blocks: `subsidy(h) = block_subsidy >> (h / interval)`,
//! reaching 0 once integer truncation exhausts it.

use crate::params::ChainParams;

/// The base coinbase subsidy for a block at `height`.
pub fn subsidy(height: u64, params: &ChainParams) -> u64 {
    let halvings = height / params.halving_interval.max(1);
    if halvings >= 64 {
        return 0;
    }
    params.block_subsidy >> halvings
}
