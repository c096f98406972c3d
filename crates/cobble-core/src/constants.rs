//! Protocol constants. All timestamps are milliseconds since the Unix epoch.

/// Easiest encodable difficulty (regtest-grade). Used as the default `bits`.
pub const DEFAULT_BITS: u32 = 0x207f_ffff;

/// A block timestamp may lead wall-clock time by at most this much.
pub const MAX_FUTURE_DRIFT_MS: u64 = 2 * 60 * 60 * 1000;

/// Default retarget interval in blocks.
pub const DEFAULT_ADJUST_EVERY: u64 = 10;
/// Default target spacing between blocks in seconds.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 30;
/// Default base coinbase subsidy.
pub const DEFAULT_BLOCK_SUBSIDY: u64 = 50;
/// Default number of blocks between subsidy halvings.
pub const DEFAULT_HALVING_INTERVAL: u64 = 100_000;
/// Default depth before a coinbase output becomes spendable.
pub const DEFAULT_COINBASE_MATURITY: u64 = 10;
/// Default cap on non-coinbase transactions per block.
pub const DEFAULT_MAX_BLOCK_TX: usize = 100;

pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_P2P_PORT: u16 = 6001;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_drift_is_two_hours() {
        assert_eq!(MAX_FUTURE_DRIFT_MS, 7_200_000);
    }

    #[test]
    fn default_bits_has_clear_sign_flag() {
        assert_eq!(DEFAULT_BITS & 0x0080_0000, 0);
    }
}
