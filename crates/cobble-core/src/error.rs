//! Error types for the Cobble protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("unknown utxo: {0}")] UnknownUtxo(String),
    #[error("inputs below outputs: have {have}, need {need}")] InsufficientInputs { have: u64, need: u64 },
    #[error("invalid signature on input {0}")] InvalidSignature(usize),
    #[error("pubkey does not match utxo address on input {0}")] AddressMismatch(usize),
    #[error("duplicate outpoint in transaction: {0}")] DuplicateOutpoint(String),
    #[error("coinbase not mature")] ImmatureCoinbase,
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("zero-value output at index {0}")] ZeroValueOutput(usize),
    #[error("value overflow")] ValueOverflow,
    #[error("invalid coinbase: {0}")] InvalidCoinbase(String),
    #[error("serialization: {0}")] Serialization(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("unexpected index: got {got}, expected {expected}")] UnexpectedIndex { got: u64, expected: u64 },
    #[error("previous hash mismatch")] PreviousHashMismatch,
    #[error("timestamp too far in the future")] TimestampTooFar,
    #[error("merkle root mismatch")] MerkleMismatch,
    #[error("insufficient proof of work")] InsufficientPow,
    #[error("missing coinbase")] MissingCoinbase,
    #[error("multiple coinbase transactions")] MultipleCoinbase,
    #[error("first transaction is not coinbase")] FirstTxNotCoinbase,
    #[error("coinbase overpays: got {got}, max {max}")] CoinbaseOverpays { got: u64, max: u64 },
    #[error("tx {index}: {source}")] Tx { index: usize, source: TxError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyExists(String),
    #[error("mempool double spend")] DoubleSpend,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")] InvalidPublicKey,
    #[error("invalid signature encoding")] InvalidSignature,
    #[error("signing failed")] SigningFailed,
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("bind failed: {0}")] Bind(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("block directory corrupted: {0}")] Corrupt(String),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("bad block file {path}: {reason}")] BadBlockFile { path: String, reason: String },
    #[error("serialize: {0}")] Serialize(String),
}

#[derive(Error, Debug)]
pub enum CobbleError {
    #[error(transparent)] Tx(#[from] TxError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Mempool(#[from] MempoolError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error("{0}")] Candidate(String),
}
