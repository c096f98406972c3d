//! Core protocol types: transactions, blocks, UTXOs.
//!
//! Every hash, id, address, and public key is a lowercase hex string;
//! amounts and heights are `u64`; timestamps are `u64` milliseconds since
//! the Unix epoch. JSON field names follow the wire convention
//! (`previousHash`, `merkleRoot`, `pubKey`, …).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{sha256, sha256_hex};
use crate::error::TxError;

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Outpoint {
    /// Id of the transaction containing the referenced output.
    pub txid: String,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input spending one previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    /// Id of the transaction being spent.
    pub txid: String,
    /// Output index being spent.
    pub index: u32,
    /// Spender's compressed secp256k1 public key, hex-encoded.
    pub pub_key: String,
    /// DER-encoded ECDSA signature over the signing preimage, hex-encoded.
    pub sig: String,
}

impl TxInput {
    /// The outpoint this input spends.
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            txid: self.txid.clone(),
            index: self.index,
        }
    }
}

/// A transaction output creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Recipient address (40 hex chars).
    pub address: String,
    /// Amount transferred. Must be positive.
    pub amount: u64,
}

/// A transaction: either a coinbase (marker set, no inputs) or a spend.
///
/// The `id` field is derived state: it is recomputed from content wherever
/// identity matters and never trusted from the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Derived transaction id (hex SHA-256 of the identity preimage).
    #[serde(default)]
    pub id: String,
    /// Coinbase marker.
    #[serde(default)]
    pub coinbase: bool,
    /// Inputs consuming previous outputs. Empty for coinbase.
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
}

/// Identity preimage entry for one input: signatures are excluded so the
/// id is stable across re-signing by the same key set.
#[derive(Serialize)]
struct IdInput<'a> {
    txid: &'a str,
    index: u32,
    #[serde(rename = "pubKey")]
    pub_key: &'a str,
}

/// Signing preimage entry for one input: outpoint only.
#[derive(Serialize)]
struct SignInput<'a> {
    txid: &'a str,
    index: u32,
}

/// Preimage entry for one output, shared by both canonicalizations.
#[derive(Serialize)]
struct PreimageOutput<'a> {
    address: &'a str,
    amount: u64,
}

#[derive(Serialize)]
struct IdPreimage<'a> {
    inputs: Vec<IdInput<'a>>,
    outputs: Vec<PreimageOutput<'a>>,
}

#[derive(Serialize)]
struct SignPreimage<'a> {
    inputs: Vec<SignInput<'a>>,
    outputs: Vec<PreimageOutput<'a>>,
}

impl Transaction {
    fn preimage_outputs(&self) -> Vec<PreimageOutput<'_>> {
        self.outputs
            .iter()
            .map(|o| PreimageOutput {
                address: &o.address,
                amount: o.amount,
            })
            .collect()
    }

    /// Compute the transaction id: SHA-256 over the canonical JSON of
    /// `(txid, index, pubKey)` per input and `(address, amount)` per output.
    pub fn compute_id(&self) -> Result<String, TxError> {
        let preimage = IdPreimage {
            inputs: self
                .inputs
                .iter()
                .map(|i| IdInput {
                    txid: &i.txid,
                    index: i.index,
                    pub_key: &i.pub_key,
                })
                .collect(),
            outputs: self.preimage_outputs(),
        };
        let bytes =
            serde_json::to_vec(&preimage).map_err(|e| TxError::Serialization(e.to_string()))?;
        Ok(sha256_hex(&bytes))
    }

    /// Compute the signing preimage ("sighash-ALL"): SHA-256 over the
    /// canonical JSON of `(txid, index)` per input and `(address, amount)`
    /// per output. Every input signs this same digest.
    pub fn sighash(&self) -> Result<[u8; 32], TxError> {
        let preimage = SignPreimage {
            inputs: self
                .inputs
                .iter()
                .map(|i| SignInput {
                    txid: &i.txid,
                    index: i.index,
                })
                .collect(),
            outputs: self.preimage_outputs(),
        };
        let bytes =
            serde_json::to_vec(&preimage).map_err(|e| TxError::Serialization(e.to_string()))?;
        Ok(sha256(&bytes))
    }

    /// Sum of all output amounts. `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }
}

/// A block: header fields plus an ordered transaction list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height, 0-based. Height 0 is the genesis.
    pub index: u64,
    /// Header hash of the previous block; `"0"` for the genesis.
    pub previous_hash: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Merkle root over the transaction ids.
    pub merkle_root: String,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Compact difficulty target.
    pub bits: u32,
    /// Ordered transactions; the coinbase sits at position 0.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block's header hash: SHA-256 over the pipe-delimited
    /// concatenation `index|previousHash|timestamp|merkleRoot|nonce|bits`,
    /// all numbers rendered as decimal integers.
    pub fn header_hash(&self) -> String {
        let preimage = format!(
            "{}|{}|{}|{}|{}|{}",
            self.index, self.previous_hash, self.timestamp, self.merkle_root, self.nonce, self.bits
        );
        sha256_hex(preimage.as_bytes())
    }

    /// The coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.coinbase)
    }
}

/// An entry in the unspent transaction output set, keyed by outpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    /// Spendable amount.
    pub amount: u64,
    /// Owning address.
    pub address: String,
    /// Height of the block that created this output.
    pub block_height: u64,
    /// Whether the creating transaction was a coinbase.
    pub is_coinbase: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(sig: &str) -> Transaction {
        Transaction {
            id: String::new(),
            coinbase: false,
            inputs: vec![TxInput {
                txid: hex::encode([0x11; 32]),
                index: 0,
                pub_key: "02aa".into(),
                sig: sig.into(),
            }],
            outputs: vec![TxOutput {
                address: hex::encode([0xaa; 20]),
                amount: 5,
            }],
        }
    }

    fn sample_block() -> Block {
        Block {
            index: 1,
            previous_hash: hex::encode([0x22; 32]),
            timestamp: 1_700_000_000_000,
            merkle_root: hex::encode([0x33; 32]),
            nonce: 42,
            bits: 0x207f_ffff,
            transactions: vec![],
        }
    }

    // --- Outpoint ---

    #[test]
    fn outpoint_display() {
        let op = Outpoint {
            txid: "ab".into(),
            index: 3,
        };
        assert_eq!(op.to_string(), "ab:3");
    }

    #[test]
    fn input_outpoint_copies_fields() {
        let tx = spend("00");
        let op = tx.inputs[0].outpoint();
        assert_eq!(op.txid, tx.inputs[0].txid);
        assert_eq!(op.index, 0);
    }

    // --- Identity ---

    #[test]
    fn id_is_stable_across_resigning() {
        let a = spend("aabb");
        let b = spend("ccdd");
        assert_eq!(a.compute_id().unwrap(), b.compute_id().unwrap());
    }

    #[test]
    fn id_changes_with_pubkey() {
        let a = spend("00");
        let mut b = spend("00");
        b.inputs[0].pub_key = "03bb".into();
        assert_ne!(a.compute_id().unwrap(), b.compute_id().unwrap());
    }

    #[test]
    fn id_changes_with_outputs() {
        let a = spend("00");
        let mut b = spend("00");
        b.outputs[0].amount = 6;
        assert_ne!(a.compute_id().unwrap(), b.compute_id().unwrap());
    }

    #[test]
    fn sighash_excludes_pubkey() {
        let a = spend("00");
        let mut b = spend("00");
        b.inputs[0].pub_key = "03bb".into();
        assert_eq!(a.sighash().unwrap(), b.sighash().unwrap());
    }

    #[test]
    fn sighash_commits_to_outpoints() {
        let a = spend("00");
        let mut b = spend("00");
        b.inputs[0].index = 1;
        assert_ne!(a.sighash().unwrap(), b.sighash().unwrap());
    }

    #[test]
    fn id_preimage_is_the_documented_json() {
        // Lock the canonicalization: field order and names are part of
        // the protocol.
        let tx = spend("ff");
        let expected_json = format!(
            "{{\"inputs\":[{{\"txid\":\"{}\",\"index\":0,\"pubKey\":\"02aa\"}}],\"outputs\":[{{\"address\":\"{}\",\"amount\":5}}]}}",
            tx.inputs[0].txid, tx.outputs[0].address
        );
        assert_eq!(tx.compute_id().unwrap(), sha256_hex(expected_json.as_bytes()));
    }

    #[test]
    fn sighash_preimage_is_the_documented_json() {
        let tx = spend("ff");
        let expected_json = format!(
            "{{\"inputs\":[{{\"txid\":\"{}\",\"index\":0}}],\"outputs\":[{{\"address\":\"{}\",\"amount\":5}}]}}",
            tx.inputs[0].txid, tx.outputs[0].address
        );
        assert_eq!(tx.sighash().unwrap(), sha256(expected_json.as_bytes()));
    }

    // --- Totals ---

    #[test]
    fn total_output_sums() {
        let mut tx = spend("00");
        tx.outputs.push(TxOutput {
            address: "bb".into(),
            amount: 7,
        });
        assert_eq!(tx.total_output(), Some(12));
    }

    #[test]
    fn total_output_overflow_is_none() {
        let mut tx = spend("00");
        tx.outputs[0].amount = u64::MAX;
        tx.outputs.push(TxOutput {
            address: "bb".into(),
            amount: 1,
        });
        assert_eq!(tx.total_output(), None);
    }

    // --- Header hash ---

    #[test]
    fn header_hash_is_pipe_delimited_preimage() {
        let block = sample_block();
        let preimage = format!(
            "1|{}|1700000000000|{}|42|545259519",
            block.previous_hash, block.merkle_root
        );
        assert_eq!(block.header_hash(), sha256_hex(preimage.as_bytes()));
    }

    #[test]
    fn header_hash_changes_with_nonce() {
        let a = sample_block();
        let mut b = sample_block();
        b.nonce += 1;
        assert_ne!(a.header_hash(), b.header_hash());
    }

    #[test]
    fn header_hash_ignores_transactions() {
        // The transaction list is committed via the merkle root only.
        let a = sample_block();
        let mut b = sample_block();
        b.transactions.push(spend("00"));
        assert_eq!(a.header_hash(), b.header_hash());
    }

    // --- Serde wire format ---

    #[test]
    fn block_json_uses_camel_case() {
        let json = serde_json::to_string(&sample_block()).unwrap();
        assert!(json.contains("\"previousHash\""));
        assert!(json.contains("\"merkleRoot\""));
        assert!(!json.contains("previous_hash"));
    }

    #[test]
    fn input_json_uses_pub_key_name() {
        let json = serde_json::to_string(&spend("00")).unwrap();
        assert!(json.contains("\"pubKey\""));
        assert!(json.contains("\"sig\""));
    }

    #[test]
    fn transaction_without_id_deserializes() {
        let json = r#"{"outputs":[{"address":"aa","amount":1}]}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.id.is_empty());
        assert!(!tx.coinbase);
        assert!(tx.inputs.is_empty());
    }

    #[test]
    fn utxo_entry_json_round_trip() {
        let entry = UtxoEntry {
            amount: 9,
            address: "aa".into(),
            block_height: 4,
            is_coinbase: true,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"blockHeight\""));
        assert!(json.contains("\"isCoinbase\""));
        let back: UtxoEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    // --- Coinbase accessor ---

    #[test]
    fn coinbase_accessor_requires_marker() {
        let mut block = sample_block();
        block.transactions.push(spend("00"));
        assert!(block.coinbase().is_none());
        block.transactions[0].coinbase = true;
        assert!(block.coinbase().is_some());
    }
}
