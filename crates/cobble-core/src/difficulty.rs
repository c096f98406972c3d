//! Difficulty retargeting.
//!
//! Every `adjust_every` blocks the node compares the observed span of the
//! last window against the expected span and rescales the target
//! proportionally, clamped to a 4x move per adjustment. The scaling runs
//! entirely in 256-bit integer arithmetic; the result is clamped to
//! `[1, max_target]` before re-encoding, so the retargeter can never
//! produce a non-positive target.

use primitive_types::{U256, U512};

use crate::compact::{self, max_target};

/// Maximum factor the target may move per adjustment window.
pub const MAX_ADJUSTMENT_FACTOR: u64 = 4;

/// Whether a retarget fires after accepting the block at `height`.
pub fn retarget_due(height: u64, adjust_every: u64) -> bool {
    adjust_every > 0 && height > 0 && height % adjust_every == 0
}

/// Compute the next compact bits from the observed window span.
///
/// `actual_ms` is the time the last `adjust_every` blocks actually took;
/// `expected_ms` is `adjust_every * target_block_time_sec * 1000`. The
/// target grows when blocks were slow and shrinks when they were fast:
///
/// ```text
/// new_target = old_target * clamp(actual, expected/4, expected*4) / expected
/// ```
///
/// clamped to `[1, max_target]` and re-encoded.
pub fn next_bits(current_bits: u32, actual_ms: u64, expected_ms: u64) -> u32 {
    if expected_ms == 0 {
        return current_bits;
    }

    let floor = expected_ms / MAX_ADJUSTMENT_FACTOR;
    let ceiling = expected_ms.saturating_mul(MAX_ADJUSTMENT_FACTOR);
    let clamped = actual_ms.clamp(floor, ceiling);

    let old_target = compact::bits_to_target(current_bits);
    let scaled: U512 = old_target.full_mul(U256::from(clamped)) / U512::from(expected_ms);

    let ceiling_target = max_target();
    let new_target = if scaled > U512::from(ceiling_target) {
        ceiling_target
    } else {
        U256::try_from(scaled).unwrap_or(ceiling_target)
    };
    let new_target = new_target.max(U256::one());

    compact::target_to_bits(new_target)
}
