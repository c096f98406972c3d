//! Transaction validation against a UTXO view.
//!
//! [`validate_transaction`] implements the full stateful rule set:
//! structure, intra-transaction double spends, UTXO existence, coinbase
//! maturity, pubkey/address binding, signature verification, and value
//! conservation. The UTXO view is supplied as a lookup closure so the
//! caller can point it at the live set or at a block-local working copy.

use std::collections::HashSet;

use crate::crypto;
use crate::error::TxError;
use crate::params::ChainParams;
use crate::types::{Outpoint, Transaction, UtxoEntry};

/// Summary of a successfully validated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTx {
    /// Total value of all spent inputs.
    pub total_input: u64,
    /// Total value of all created outputs.
    pub total_output: u64,
    /// Fee (`total_input - total_output`, zero for coinbase).
    pub fee: u64,
}

/// Validate a transaction at `current_height` against a UTXO view.
///
/// Coinbase transactions pass when they have no inputs and only positive
/// outputs; their reward bound is a block-level rule. For spends, every
/// input must reference a live UTXO, mature if it came from a coinbase,
/// owned by the input's public key, and signed over the shared signing
/// preimage. Inputs must cover outputs; the surplus is the fee.
pub fn validate_transaction<F>(
    tx: &Transaction,
    get_utxo: F,
    current_height: u64,
    params: &ChainParams,
) -> Result<ValidatedTx, TxError>
where
    F: Fn(&Outpoint) -> Option<UtxoEntry>,
{
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.amount == 0 {
            return Err(TxError::ZeroValueOutput(i));
        }
    }
    let total_output = tx.total_output().ok_or(TxError::ValueOverflow)?;

    if tx.coinbase {
        if !tx.inputs.is_empty() {
            return Err(TxError::InvalidCoinbase("has inputs".into()));
        }
        if tx.outputs.is_empty() {
            return Err(TxError::InvalidCoinbase("no outputs".into()));
        }
        return Ok(ValidatedTx {
            total_input: 0,
            total_output,
            fee: 0,
        });
    }

    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TxError::EmptyInputsOrOutputs);
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.outpoint()) {
            return Err(TxError::DuplicateOutpoint(input.outpoint().to_string()));
        }
    }

    let sighash = tx.sighash()?;
    let mut total_input: u64 = 0;

    for (i, input) in tx.inputs.iter().enumerate() {
        let outpoint = input.outpoint();
        let entry = get_utxo(&outpoint).ok_or_else(|| TxError::UnknownUtxo(outpoint.to_string()))?;

        if entry.is_coinbase
            && current_height.saturating_sub(entry.block_height) < params.coinbase_maturity
        {
            return Err(TxError::ImmatureCoinbase);
        }

        let spender = crypto::address_for_pubkey(&input.pub_key)
            .map_err(|_| TxError::AddressMismatch(i))?;
        if spender != entry.address {
            return Err(TxError::AddressMismatch(i));
        }

        if !crypto::verify_signature(&input.pub_key, &sighash, &input.sig) {
            return Err(TxError::InvalidSignature(i));
        }

        total_input = total_input
            .checked_add(entry.amount)
            .ok_or(TxError::ValueOverflow)?;
    }

    if total_input < total_output {
        return Err(TxError::InsufficientInputs {
            have: total_input,
            need: total_output,
        });
    }

    Ok(ValidatedTx {
        total_input,
        total_output,
        fee: total_input - total_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{TxInput, TxOutput};
    use std::collections::HashMap;

    fn utxo(amount: u64, address: &str, height: u64, coinbase: bool) -> UtxoEntry {
        UtxoEntry {
            amount,
            address: address.into(),
            block_height: height,
            is_coinbase: coinbase,
        }
    }

    fn lookup(map: &HashMap<Outpoint, UtxoEntry>) -> impl Fn(&Outpoint) -> Option<UtxoEntry> + '_ {
        |op| map.get(op).cloned()
    }

    /// A signed single-input spend of `outpoint`, paying `amount` to `to`.
    fn signed_spend(kp: &KeyPair, outpoint: Outpoint, to: &str, amount: u64) -> Transaction {
        let mut tx = Transaction {
            id: String::new(),
            coinbase: false,
            inputs: vec![TxInput {
                txid: outpoint.txid,
                index: outpoint.index,
                pub_key: kp.public_key_hex(),
                sig: String::new(),
            }],
            outputs: vec![TxOutput {
                address: to.into(),
                amount,
            }],
        };
        let sighash = tx.sighash().unwrap();
        tx.inputs[0].sig = kp.sign_digest(&sighash).unwrap();
        tx
    }

    fn op(byte: u8) -> Outpoint {
        Outpoint {
            txid: hex::encode([byte; 32]),
            index: 0,
        }
    }

    fn default_params() -> ChainParams {
        ChainParams {
            coinbase_maturity: 10,
            ..ChainParams::default()
        }
    }

    // --- Coinbase ---

    #[test]
    fn coinbase_with_positive_outputs_accepts() {
        let tx = Transaction {
            id: String::new(),
            coinbase: true,
            inputs: vec![],
            outputs: vec![TxOutput {
                address: "aa".into(),
                amount: 50,
            }],
        };
        let result = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap();
        assert_eq!(result.fee, 0);
        assert_eq!(result.total_output, 50);
    }

    #[test]
    fn coinbase_with_inputs_rejects() {
        let kp = KeyPair::generate();
        let mut tx = signed_spend(&kp, op(1), "aa", 5);
        tx.coinbase = true;
        let err = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap_err();
        assert!(matches!(err, TxError::InvalidCoinbase(_)));
    }

    #[test]
    fn coinbase_with_zero_output_rejects() {
        let tx = Transaction {
            id: String::new(),
            coinbase: true,
            inputs: vec![],
            outputs: vec![TxOutput {
                address: "aa".into(),
                amount: 0,
            }],
        };
        let err = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::ZeroValueOutput(0));
    }

    // --- Structure ---

    #[test]
    fn spend_without_inputs_rejects() {
        let tx = Transaction {
            id: String::new(),
            coinbase: false,
            inputs: vec![],
            outputs: vec![TxOutput {
                address: "aa".into(),
                amount: 1,
            }],
        };
        let err = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::EmptyInputsOrOutputs);
    }

    #[test]
    fn spend_without_outputs_rejects() {
        let kp = KeyPair::generate();
        let mut tx = signed_spend(&kp, op(1), "aa", 5);
        tx.outputs.clear();
        let err = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::EmptyInputsOrOutputs);
    }

    #[test]
    fn duplicate_outpoint_rejects() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 1, false));

        let mut tx = signed_spend(&kp, op(1), "aa", 5);
        tx.inputs.push(tx.inputs[0].clone());
        let sighash = tx.sighash().unwrap();
        for input in &mut tx.inputs {
            input.sig = kp.sign_digest(&sighash).unwrap();
        }

        let err = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap_err();
        assert!(matches!(err, TxError::DuplicateOutpoint(_)));
    }

    // --- UTXO lookup and maturity ---

    #[test]
    fn missing_utxo_rejects() {
        let kp = KeyPair::generate();
        let tx = signed_spend(&kp, op(1), "aa", 5);
        let err = validate_transaction(&tx, |_| None, 5, &default_params()).unwrap_err();
        assert!(matches!(err, TxError::UnknownUtxo(_)));
    }

    #[test]
    fn immature_coinbase_rejects() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 5, true));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        // Height 14: only 9 confirmations, maturity is 10.
        let err = validate_transaction(&tx, lookup(&map), 14, &default_params()).unwrap_err();
        assert_eq!(err, TxError::ImmatureCoinbase);
        assert_eq!(err.to_string(), "coinbase not mature");
    }

    #[test]
    fn mature_coinbase_accepts() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 5, true));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        assert!(validate_transaction(&tx, lookup(&map), 15, &default_params()).is_ok());
    }

    #[test]
    fn non_coinbase_utxo_has_no_maturity() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 5, false));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        assert!(validate_transaction(&tx, lookup(&map), 5, &default_params()).is_ok());
    }

    // --- Ownership and signatures ---

    #[test]
    fn wrong_owner_rejects() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &other.address(), 1, false));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        let err = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::AddressMismatch(0));
    }

    #[test]
    fn bad_signature_rejects() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 1, false));

        let mut tx = signed_spend(&kp, op(1), "aa", 5);
        // Re-sign over a different preimage by mutating an output afterwards.
        tx.outputs[0].amount = 6;
        let err = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::InvalidSignature(0));
    }

    #[test]
    fn garbage_signature_rejects_without_panic() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 1, false));

        let mut tx = signed_spend(&kp, op(1), "aa", 5);
        tx.inputs[0].sig = "zz-not-hex".into();
        let err = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::InvalidSignature(0));
    }

    // --- Value conservation ---

    #[test]
    fn outputs_exceeding_inputs_reject() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(4, &kp.address(), 1, false));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        let err = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap_err();
        assert_eq!(err, TxError::InsufficientInputs { have: 4, need: 5 });
    }

    #[test]
    fn fee_is_input_surplus() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(10, &kp.address(), 1, false));

        let tx = signed_spend(&kp, op(1), "aa", 7);
        let result = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap();
        assert_eq!(result.total_input, 10);
        assert_eq!(result.total_output, 7);
        assert_eq!(result.fee, 3);
    }

    #[test]
    fn exact_spend_has_zero_fee() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(5, &kp.address(), 1, false));

        let tx = signed_spend(&kp, op(1), "aa", 5);
        let result = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap();
        assert_eq!(result.fee, 0);
    }

    #[test]
    fn multi_input_spend_sums_inputs() {
        let kp = KeyPair::generate();
        let mut map = HashMap::new();
        map.insert(op(1), utxo(3, &kp.address(), 1, false));
        map.insert(op(2), utxo(4, &kp.address(), 1, false));

        let mut tx = Transaction {
            id: String::new(),
            coinbase: false,
            inputs: vec![
                TxInput {
                    txid: op(1).txid,
                    index: 0,
                    pub_key: kp.public_key_hex(),
                    sig: String::new(),
                },
                TxInput {
                    txid: op(2).txid,
                    index: 0,
                    pub_key: kp.public_key_hex(),
                    sig: String::new(),
                },
            ],
            outputs: vec![TxOutput {
                address: "aa".into(),
                amount: 6,
            }],
        };
        let sighash = tx.sighash().unwrap();
        let sig = kp.sign_digest(&sighash).unwrap();
        for input in &mut tx.inputs {
            input.sig = sig.clone();
        }

        let result = validate_transaction(&tx, lookup(&map), 5, &default_params()).unwrap();
        assert_eq!(result.total_input, 7);
        assert_eq!(result.fee, 1);
    }
}
