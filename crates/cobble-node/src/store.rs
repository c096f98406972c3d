//! Chain store: file-per-block persistence and the UTXO index.
//!
//! The data directory holds `config.json` (chain parameters, including
//! the live `bits`) and a `blocks/` directory with one canonical-JSON
//! file per block named `<height>.json`. On startup the store loads the
//! block files in integer height order, verifies linkage, and replays
//! every block to rebuild the UTXO map; an empty directory gets a fresh
//! genesis. Corruption of existing files is fatal (the process exits
//! nonzero rather than run on a broken chain).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cobble_core::error::{CobbleError, StoreError, TxError};
use cobble_core::genesis;
use cobble_core::params::ChainParams;
use cobble_core::types::{Block, Outpoint, Transaction, UtxoEntry};

/// Append-only chain storage with an in-memory UTXO index.
#[derive(Debug)]
pub struct ChainStore {
    data_dir: PathBuf,
    blocks: Vec<Block>,
    utxo: HashMap<Outpoint, UtxoEntry>,
    params: ChainParams,
}

impl ChainStore {
    /// Open (or initialize) the store under `data_dir`.
    ///
    /// Loads `config.json` (writing defaults when absent), reads all
    /// block files in height order, creates and persists genesis when the
    /// block directory is empty, and rebuilds the UTXO set by replay.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, CobbleError> {
        let data_dir = data_dir.into();
        let blocks_dir = data_dir.join("blocks");
        fs::create_dir_all(&blocks_dir).map_err(StoreError::Io)?;

        let params = load_params(&data_dir.join("config.json"))?;

        let mut store = Self {
            data_dir,
            blocks: Vec::new(),
            utxo: HashMap::new(),
            params,
        };
        store.persist_params()?;
        store.load()?;
        Ok(store)
    }

    fn blocks_dir(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Read every block file in integer height order and replay it.
    fn load(&mut self) -> Result<(), CobbleError> {
        let mut files: Vec<(u64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(self.blocks_dir()).map_err(StoreError::Io)? {
            let path = entry.map_err(StoreError::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Height order comes from the parsed stem, never from the
            // lexicographic file order.
            let Some(height) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            files.push((height, path));
        }
        files.sort_by_key(|(height, _)| *height);

        for (position, (height, path)) in files.iter().enumerate() {
            if *height != position as u64 {
                return Err(StoreError::Corrupt(format!(
                    "expected block file for height {position}, found {height}"
                ))
                .into());
            }
            let bytes = fs::read(path).map_err(StoreError::Io)?;
            let block: Block =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::BadBlockFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            if block.index != *height {
                return Err(StoreError::BadBlockFile {
                    path: path.display().to_string(),
                    reason: format!("index {} does not match file height {height}", block.index),
                }
                .into());
            }
            if let Some(prev) = self.blocks.last() {
                if block.previous_hash != prev.header_hash() {
                    return Err(StoreError::Corrupt(format!(
                        "block {height} does not link to block {}",
                        prev.index
                    ))
                    .into());
                }
            }
            self.blocks.push(block);
        }

        if self.blocks.is_empty() {
            let genesis = genesis::genesis_block(&self.params)?;
            self.write_block(&genesis)?;
            info!(hash = %genesis.header_hash(), "initialized block directory with genesis");
            self.blocks.push(genesis);
        } else {
            debug!(height = self.tip_height(), "loaded chain from disk");
        }

        self.rebuild_utxo()?;
        Ok(())
    }

    /// Persist a block and commit it with its post-state UTXO set.
    ///
    /// The caller (block validation) supplies the UTXO map that results
    /// from applying the block, so the commit is a swap and cannot
    /// half-apply.
    pub fn append(
        &mut self,
        block: Block,
        utxo_after: HashMap<Outpoint, UtxoEntry>,
    ) -> Result<(), CobbleError> {
        self.write_block(&block)?;
        self.blocks.push(block);
        self.utxo = utxo_after;
        Ok(())
    }

    fn write_block(&self, block: &Block) -> Result<(), StoreError> {
        let path = self.blocks_dir().join(format!("{}.json", block.index));
        let json = serde_json::to_vec(block).map_err(|e| StoreError::Serialize(e.to_string()))?;
        fs::write(path, json).map_err(StoreError::Io)
    }

    /// Clear the UTXO set and replay every block from height 0.
    pub fn rebuild_utxo(&mut self) -> Result<(), CobbleError> {
        let mut utxo = HashMap::new();
        for block in &self.blocks {
            apply_block(&mut utxo, block)?;
        }
        self.utxo = utxo;
        Ok(())
    }

    /// Update the live `bits` and persist the chain parameters.
    pub fn set_bits(&mut self, bits: u32) -> Result<(), CobbleError> {
        self.params.bits = bits;
        self.persist_params()
    }

    /// Write `config.json` via a temp file and rename.
    fn persist_params(&self) -> Result<(), CobbleError> {
        let json = serde_json::to_vec_pretty(&self.params)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        let tmp = self.config_path().with_extension("json.tmp");
        fs::write(&tmp, json).map_err(StoreError::Io)?;
        fs::rename(&tmp, self.config_path()).map_err(StoreError::Io)?;
        Ok(())
    }

    /// The chain tip, if any block has been connected.
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Height of the chain tip. The chain always holds at least genesis.
    pub fn tip_height(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    /// Block at `height`, if within range.
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|i| self.blocks.get(i))
    }

    /// The whole chain in height order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The live UTXO set.
    pub fn utxo(&self) -> &HashMap<Outpoint, UtxoEntry> {
        &self.utxo
    }

    /// Live chain parameters.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Spendable outputs held by `address`.
    pub fn utxos_for_address(&self, address: &str) -> Vec<(Outpoint, UtxoEntry)> {
        self.utxo
            .iter()
            .filter(|(_, entry)| entry.address == address)
            .map(|(op, entry)| (op.clone(), entry.clone()))
            .collect()
    }

    /// Find a confirmed transaction by id, with the height of its block.
    pub fn find_tx(&self, id: &str) -> Option<(Transaction, u64)> {
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.id == id {
                    return Some((tx.clone(), block.index));
                }
            }
        }
        None
    }
}

/// Fold one block into a UTXO map: remove spent outpoints, add outputs.
///
/// Ids are recomputed from content so replay never depends on what a
/// file claims its ids are.
pub fn apply_block(
    utxo: &mut HashMap<Outpoint, UtxoEntry>,
    block: &Block,
) -> Result<(), TxError> {
    for tx in &block.transactions {
        for input in &tx.inputs {
            utxo.remove(&input.outpoint());
        }
        let id = tx.compute_id()?;
        for (index, output) in tx.outputs.iter().enumerate() {
            utxo.insert(
                Outpoint {
                    txid: id.clone(),
                    index: index as u32,
                },
                UtxoEntry {
                    amount: output.amount,
                    address: output.address.clone(),
                    block_height: block.index,
                    is_coinbase: tx.coinbase,
                },
            );
        }
    }
    Ok(())
}

/// Load chain parameters, defaulting when no config file exists yet.
fn load_params(path: &Path) -> Result<ChainParams, StoreError> {
    if !path.exists() {
        return Ok(ChainParams::default());
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(format!(
        "config file {}: {e}",
        path.display()
    )))
}
