//! Chain parameters, persisted as `config.json` in the data directory.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ADJUST_EVERY, DEFAULT_BITS, DEFAULT_BLOCK_SUBSIDY, DEFAULT_BLOCK_TIME_SECS,
    DEFAULT_COINBASE_MATURITY, DEFAULT_HALVING_INTERVAL, DEFAULT_MAX_BLOCK_TX,
};

/// Live chain configuration.
///
/// `bits` is the only field the node itself rewrites (on retarget); the
/// rest are deployment-time knobs. Wire/disk names are camelCase per the
/// protocol convention.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    /// Retarget interval: difficulty adjusts every this many blocks.
    pub adjust_every: u64,
    /// Target spacing between blocks, in seconds.
    pub target_block_time_sec: u64,
    /// Base coinbase subsidy before halvings.
    pub block_subsidy: u64,
    /// Number of blocks between subsidy halvings.
    pub halving_interval: u64,
    /// Minimum depth before a coinbase output may be spent.
    pub coinbase_maturity: u64,
    /// Maximum non-coinbase transactions per block.
    pub max_block_tx: usize,
    /// Current compact difficulty target.
    pub bits: u32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            adjust_every: DEFAULT_ADJUST_EVERY,
            target_block_time_sec: DEFAULT_BLOCK_TIME_SECS,
            block_subsidy: DEFAULT_BLOCK_SUBSIDY,
            halving_interval: DEFAULT_HALVING_INTERVAL,
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
            max_block_tx: DEFAULT_MAX_BLOCK_TX,
            bits: DEFAULT_BITS,
        }
    }
}
