//! In-memory pool of validated, unconfirmed transactions.
//!
//! Entries keep their admission order (block candidates select in that
//! order) and every outpoint spent by a pool entry is reserved, giving
//! O(1) double-spend rejection across the pool. Transactions must be
//! validated by the caller before insertion; the pool only checks
//! duplicates and conflicts.

use std::collections::{HashMap, HashSet};

use crate::error::MempoolError;
use crate::types::{Block, Outpoint, Transaction};

/// Insertion-ordered pool of pending transactions.
///
/// Not thread-safe; the node wraps it in its state mutex.
#[derive(Default)]
pub struct Mempool {
    /// Primary storage: id → transaction.
    entries: HashMap<String, Transaction>,
    /// Ids in admission order.
    order: Vec<String>,
    /// Outpoints reserved by pool entries.
    spent: HashSet<Outpoint>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validated transaction whose `id` field is set.
    ///
    /// Rejects a duplicate id and any transaction spending an outpoint
    /// already reserved by the pool.
    pub fn insert(&mut self, tx: Transaction) -> Result<String, MempoolError> {
        let id = tx.id.clone();
        if self.entries.contains_key(&id) {
            return Err(MempoolError::AlreadyExists(id));
        }
        for input in &tx.inputs {
            if self.spent.contains(&input.outpoint()) {
                return Err(MempoolError::DoubleSpend);
            }
        }

        for input in &tx.inputs {
            self.spent.insert(input.outpoint());
        }
        self.order.push(id.clone());
        self.entries.insert(id.clone(), tx);
        Ok(id)
    }

    /// Whether a transaction with this id is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Look up a pending transaction by id.
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.entries.get(id)
    }

    /// Whether an outpoint is reserved by some pool entry.
    pub fn is_reserved(&self, outpoint: &Outpoint) -> bool {
        self.spent.contains(outpoint)
    }

    /// All pending transactions in admission order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    /// Up to `max` pending transactions in admission order.
    pub fn select(&self, max: usize) -> Vec<&Transaction> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .take(max)
            .collect()
    }

    /// Evict on block acceptance: drop transactions included in the block
    /// and any pool entry spending an outpoint the block spent (those are
    /// superseded and can never confirm).
    pub fn remove_confirmed(&mut self, block: &Block) {
        let mut confirmed: HashSet<String> = HashSet::new();
        let mut block_spent: HashSet<Outpoint> = HashSet::new();
        for tx in &block.transactions {
            if let Ok(id) = tx.compute_id() {
                confirmed.insert(id);
            }
            for input in &tx.inputs {
                block_spent.insert(input.outpoint());
            }
        }

        let stale: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                confirmed.contains(*id)
                    || self.entries.get(*id).is_some_and(|tx| {
                        tx.inputs.iter().any(|i| block_spent.contains(&i.outpoint()))
                    })
            })
            .cloned()
            .collect();

        for id in stale {
            self.remove_entry(&id);
        }
    }

    fn remove_entry(&mut self, id: &str) {
        if let Some(tx) = self.entries.remove(id) {
            for input in &tx.inputs {
                self.spent.remove(&input.outpoint());
            }
            self.order.retain(|entry| entry != id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
