//! Node composition and the single critical section.
//!
//! [`Node`] owns all mutable chain state behind one mutex: the chain
//! store, the mempool, and the seen-sets used for gossip deduplication.
//! Every mutation sequence — validate, mutate UTXO/chain/mempool, persist,
//! enqueue gossip — runs while the lock is held, so no reader or peer
//! event ever observes a partial update. Gossip sends only enqueue onto
//! per-peer channels and never block inside the lock.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cobble_core::block_validation::{self, BlockContext};
use cobble_core::candidate;
use cobble_core::difficulty;
use cobble_core::error::CobbleError;
use cobble_core::params::ChainParams;
use cobble_core::types::{Block, Outpoint, Transaction, UtxoEntry};
use cobble_core::validation;
use cobble_network::{GossipHandle, NetworkEvent, PeerId, PeerMessage};

use crate::config::NodeConfig;
use crate::store::ChainStore;

/// All mutable node state, guarded by the node's mutex.
struct NodeState {
    store: ChainStore,
    mempool: cobble_core::mempool::Mempool,
    /// Transaction ids already validated and applied (or pooled).
    seen_tx: HashSet<String>,
    /// Header hashes of blocks already accepted.
    seen_block: HashSet<String>,
}

/// The full node: chain store, mempool, and gossip wiring.
pub struct Node {
    state: Mutex<NodeState>,
    gossip: Option<GossipHandle>,
}

/// Wall-clock milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

impl Node {
    /// Open the store under `config.data_dir` and build the node.
    ///
    /// Pass the gossip handle when the network layer is running; tests
    /// and single-node deployments pass `None`.
    pub fn new(config: &NodeConfig, gossip: Option<GossipHandle>) -> Result<Arc<Self>, CobbleError> {
        let store = ChainStore::open(config.data_dir.clone())?;
        info!(
            height = store.tip_height(),
            utxos = store.utxo().len(),
            "chain store ready"
        );

        // Blocks on disk are already applied; mark them seen so a peer
        // re-announcing history is a no-op.
        let seen_block: HashSet<String> =
            store.blocks().iter().map(|b| b.header_hash()).collect();

        Ok(Arc::new(Self {
            state: Mutex::new(NodeState {
                store,
                mempool: cobble_core::mempool::Mempool::new(),
                seen_tx: HashSet::new(),
                seen_block,
            }),
            gossip,
        }))
    }

    /// Validate a transaction and admit it to the mempool.
    ///
    /// `origin` names the peer the transaction arrived from, excluded
    /// from the re-broadcast. A transaction already seen reports its id
    /// as an idempotent success and is not re-gossiped.
    pub fn submit_transaction(
        &self,
        mut tx: Transaction,
        origin: Option<PeerId>,
    ) -> Result<String, CobbleError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let id = tx.compute_id().map_err(CobbleError::from)?;
        tx.id = id.clone();

        if state.seen_tx.contains(&id) {
            return Ok(id);
        }

        let current_height = state.store.tip_height();
        let params = state.store.params().clone();
        let utxo = state.store.utxo();
        validation::validate_transaction(&tx, |op| utxo.get(op).cloned(), current_height, &params)?;

        state.mempool.insert(tx.clone())?;
        state.seen_tx.insert(id.clone());
        info!(%id, pool = state.mempool.len(), "transaction admitted");

        if let Some(gossip) = &self.gossip {
            gossip.broadcast_except(origin, &PeerMessage::Tx { tx });
        }
        Ok(id)
    }

    /// Validate a solved block, append it, evict its transactions from
    /// the mempool, run the retargeter, and re-broadcast.
    ///
    /// A block already accepted reports its height as an idempotent
    /// success.
    pub fn submit_block(&self, block: Block, origin: Option<PeerId>) -> Result<u64, CobbleError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let hash = block.header_hash();
        if state.seen_block.contains(&hash) {
            return Ok(block.index);
        }

        let params = state.store.params().clone();
        let applied = {
            let context = BlockContext {
                tip: state.store.tip(),
                now_ms: now_ms(),
            };
            block_validation::validate_block(&block, &context, state.store.utxo(), &params)?
        };

        // Stored blocks carry their derived ids.
        let mut block = block;
        for tx in &mut block.transactions {
            tx.id = tx.compute_id().map_err(CobbleError::from)?;
        }

        let height = block.index;
        state.store.append(block.clone(), applied.utxo)?;
        state.mempool.remove_confirmed(&block);
        state.seen_block.insert(hash.clone());
        info!(
            height,
            %hash,
            txs = block.transactions.len(),
            fees = applied.total_fees,
            "block accepted"
        );

        self.retarget(state, height, block.timestamp, &params)?;

        if let Some(gossip) = &self.gossip {
            gossip.broadcast_except(origin, &PeerMessage::Block { block });
        }
        Ok(height)
    }

    /// Adjust difficulty after the block at `height` when the window
    /// boundary is reached, persisting the new bits with the chain.
    fn retarget(
        &self,
        state: &mut NodeState,
        height: u64,
        tip_timestamp: u64,
        params: &ChainParams,
    ) -> Result<(), CobbleError> {
        if !difficulty::retarget_due(height, params.adjust_every) {
            return Ok(());
        }
        let Some(window_start_ts) = state
            .store
            .block_at(height - params.adjust_every)
            .map(|b| b.timestamp)
        else {
            return Ok(());
        };

        let actual_ms = tip_timestamp.saturating_sub(window_start_ts);
        let expected_ms = params
            .adjust_every
            .saturating_mul(params.target_block_time_sec)
            .saturating_mul(1000);
        let new_bits = difficulty::next_bits(params.bits, actual_ms, expected_ms);
        if new_bits != params.bits {
            info!(
                height,
                old_bits = format_args!("{:#010x}", params.bits),
                new_bits = format_args!("{:#010x}", new_bits),
                actual_ms,
                expected_ms,
                "difficulty retargeted"
            );
        }
        state.store.set_bits(new_bits)
    }

    /// Assemble an unsolved block candidate paying `miner_address`.
    pub fn build_candidate(&self, miner_address: &str) -> Result<Block, CobbleError> {
        let guard = self.state.lock();
        let tip = guard
            .store
            .tip()
            .ok_or_else(|| CobbleError::Candidate("chain is empty".into()))?;
        let pool = guard.mempool.transactions();
        let utxo = guard.store.utxo();
        let block = candidate::build_candidate(
            miner_address,
            tip,
            guard.store.params(),
            &pool,
            |op| utxo.get(op).cloned(),
            now_ms(),
        )
        .map_err(CobbleError::from)?;
        Ok(block)
    }

    // --- Read accessors for the HTTP layer ---

    /// Live chain parameters.
    pub fn chain_params(&self) -> ChainParams {
        self.state.lock().store.params().clone()
    }

    /// The entire chain, height-ordered.
    pub fn chain(&self) -> Vec<Block> {
        self.state.lock().store.blocks().to_vec()
    }

    /// The tip block, if any.
    pub fn tip(&self) -> Option<Block> {
        self.state.lock().store.tip().cloned()
    }

    /// Height of the tip.
    pub fn tip_height(&self) -> u64 {
        self.state.lock().store.tip_height()
    }

    /// Block at `height`, if within range.
    pub fn block_at(&self, height: u64) -> Option<Block> {
        self.state.lock().store.block_at(height).cloned()
    }

    /// Pending transactions in admission order.
    pub fn mempool_transactions(&self) -> Vec<Transaction> {
        self.state.lock().mempool.transactions()
    }

    /// Spendable outputs held by `address`.
    pub fn utxos_for_address(&self, address: &str) -> Vec<(Outpoint, UtxoEntry)> {
        self.state.lock().store.utxos_for_address(address)
    }

    /// Find a transaction by id on the chain (with its block height) or
    /// in the mempool (height `None`).
    pub fn find_tx(&self, id: &str) -> Option<(Transaction, Option<u64>)> {
        let guard = self.state.lock();
        if let Some((tx, height)) = guard.store.find_tx(id) {
            return Some((tx, Some(height)));
        }
        guard.mempool.get(id).cloned().map(|tx| (tx, None))
    }

    /// Number of live peer connections.
    pub fn peer_count(&self) -> usize {
        self.gossip.as_ref().map_or(0, GossipHandle::peer_count)
    }

    // --- Gossip event loop ---

    /// Drain network events until the channel closes.
    ///
    /// First valid receipt of a message validates and applies it (the
    /// submit path re-broadcasts to all other peers); duplicates
    /// short-circuit on the seen-sets; invalid messages are dropped with
    /// a warning and the peer stays connected.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NetworkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                NetworkEvent::Message { peer, message } => self.handle_message(peer, message),
                NetworkEvent::Connected { peer } => {
                    debug!(peer, peers = self.peer_count(), "peer connected");
                    if let Some(gossip) = &self.gossip {
                        gossip.send_to(peer, &PeerMessage::GetTip);
                    }
                }
                NetworkEvent::Disconnected { peer } => {
                    debug!(peer, peers = self.peer_count(), "peer disconnected");
                }
            }
        }
    }

    fn handle_message(&self, peer: PeerId, message: PeerMessage) {
        match message {
            PeerMessage::Tx { tx } => {
                if let Err(e) = self.submit_transaction(tx, Some(peer)) {
                    warn!(peer, "rejected peer transaction: {e}");
                }
            }
            PeerMessage::Block { block } => {
                if let Err(e) = self.submit_block(block, Some(peer)) {
                    warn!(peer, "rejected peer block: {e}");
                }
            }
            PeerMessage::GetTip => {
                if let Some(gossip) = &self.gossip {
                    gossip.send_to(peer, &PeerMessage::Tip { tip: self.tip() });
                }
            }
            PeerMessage::Tip { tip } => {
                // Tip exchange is informational: divergence is detected
                // but this node never reorganizes onto another chain.
                if let Some(remote) = tip {
                    let local = self.tip_height();
                    if remote.index > local {
                        warn!(
                            peer,
                            remote = remote.index,
                            local,
                            "peer tip is ahead; chains have diverged"
                        );
                    }
                }
            }
        }
    }
}
