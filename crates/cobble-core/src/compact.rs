//! Compact ("bits") encoding of the 256-bit proof-of-work target.
//!
//! `bits` is a 32-bit word: the top byte is a size in bytes, the low 23
//! bits are the mantissa (bit 23 is a sign flag, always clear here). The
//! target expands as
//!
//! ```text
//! size <= 3:  target = mantissa >> (8 * (3 - size))
//! size  > 3:  target = mantissa << (8 * (size - 3))
//! ```
//!
//! Encoding truncates the target to its top three bytes, so
//! `bits_to_target(target_to_bits(t)) <= t` with the loss bounded to the
//! lowest byte of precision; re-encoding an expanded target is exact.
//!
//! All target math is 256-bit unsigned integer arithmetic.

use primitive_types::U256;

/// The mantissa sign flag. Never set in a valid encoding.
const SIGN_BIT: u32 = 0x0080_0000;

/// Mask selecting the 23-bit mantissa.
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// The easiest encodable difficulty: mantissa `0x7fffff` at size 32.
pub const MAX_BITS: u32 = 0x207f_ffff;

/// The largest target [`MAX_BITS`] expands to.
pub fn max_target() -> U256 {
    bits_to_target(MAX_BITS)
}

/// Expand a compact `bits` word into its 256-bit target.
///
/// A size byte above 32 would overflow 256 bits; such encodings are
/// treated as an unbounded target (`U256::MAX`).
pub fn bits_to_target(bits: u32) -> U256 {
    let size = bits >> 24;
    let mantissa = U256::from(bits & MANTISSA_MASK);
    if size <= 3 {
        mantissa >> (8 * (3 - size) as usize)
    } else if size <= 32 {
        mantissa << (8 * (size - 3) as usize)
    } else {
        U256::MAX
    }
}

/// Encode a 256-bit target into its compact `bits` word.
///
/// Chooses the smallest size whose top three bytes hold the target with
/// bit 23 clear; when the leading mantissa bit would collide with the
/// sign flag, the mantissa shifts right one byte and the size grows.
pub fn target_to_bits(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut size = (target.bits() + 7) / 8;
    let mut mantissa: u32 = if size <= 3 {
        target.low_u32() << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }
    ((size as u32) << 24) | (mantissa & MANTISSA_MASK)
}

/// Whether a block hash (hex) meets the difficulty encoded in `bits`.
///
/// Interprets the hash as a 256-bit unsigned integer and compares it to
/// the expanded target. An unparseable hash never meets any target.
pub fn hash_meets_bits(hash_hex: &str, bits: u32) -> bool {
    match U256::from_str_radix(hash_hex, 16) {
        Ok(hash) => hash <= bits_to_target(bits),
        Err(_) => false,
    }
}
