//! SHA-256 Merkle root over transaction ids.
//!
//! Leaves are the hex transaction ids themselves. Each layer pairs
//! adjacent entries and hashes the concatenation of the two hex strings;
//! an odd layer duplicates its last element before pairing. A single id
//! is its own root; the empty list hashes to `SHA256("")`.

use crate::crypto::sha256_hex;

/// Compute the Merkle root of an ordered list of transaction ids.
pub fn merkle_root(ids: &[String]) -> String {
    if ids.is_empty() {
        return sha256_hex(b"");
    }

    let mut layer: Vec<String> = ids.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = layer[layer.len() - 1].clone();
            layer.push(last);
        }
        layer = layer
            .chunks(2)
            .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1]).as_bytes()))
            .collect();
    }
    layer.remove(0)
}
