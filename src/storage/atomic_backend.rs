//! Staging of cross-chain effects per verified block
//!
//! Verifying a block pins its merged shared-memory requests under the block
//! hash. Accepting the block indexes its transactions in the atomic
//! repository, commits them with the canonical-chain batch and applies the
//! requests to shared memory. Rejecting it drops the pinned requests.

use crate::core::atomic::{AtomicRequests, Tx};
use crate::core::{BonusBlocks, Id, LocalChain};
use crate::error::{BlockchainError, Result};
use crate::storage::SharedMemory;
use crate::utils::{deserialize, serialize};
use log::{debug, info};
use sled::Batch;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

const TX_HEIGHT_PREFIX: &[u8] = b"atx/";
const HEIGHT_OPS_PREFIX: &[u8] = b"aops/";

/// Repository key: accepted tx id -> height
pub fn tx_height_key(tx_id: &Id) -> Vec<u8> {
    [TX_HEIGHT_PREFIX, tx_id.as_bytes()].concat()
}

/// Repository key: height -> merged requests accepted at that height
pub fn height_ops_key(height: u64) -> Vec<u8> {
    [HEIGHT_OPS_PREFIX, &height.to_be_bytes()[..]].concat()
}

#[derive(Debug, Clone)]
struct PinnedRequests {
    height: u64,
    tx_ids: Vec<Id>,
    requests: BTreeMap<Id, AtomicRequests>,
}

pub struct AtomicBackend {
    bonus_blocks: BonusBlocks,
    shared_memory: Arc<dyn SharedMemory>,
    verified: RwLock<HashMap<Id, PinnedRequests>>,
}

impl AtomicBackend {
    pub fn new(
        bonus_blocks: BonusBlocks,
        shared_memory: Arc<dyn SharedMemory>,
    ) -> AtomicBackend {
        AtomicBackend {
            bonus_blocks,
            shared_memory,
            verified: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared_memory(&self) -> &dyn SharedMemory {
        self.shared_memory.as_ref()
    }

    pub fn bonus_blocks(&self) -> &BonusBlocks {
        &self.bonus_blocks
    }

    pub fn is_bonus(&self, height: u64, block_hash: &Id) -> bool {
        self.bonus_blocks.is_bonus(height, block_hash)
    }

    /// Pins the merged requests of `txs` under `block_hash`, replacing
    /// anything pinned there before.
    pub fn insert_txs(&self, block_hash: Id, height: u64, txs: &[Tx]) -> Result<()> {
        let mut requests: BTreeMap<Id, AtomicRequests> = BTreeMap::new();
        let mut tx_ids = Vec::with_capacity(txs.len());
        for tx in txs {
            let (chain_id, tx_requests) = tx.atomic_ops()?;
            requests.entry(chain_id).or_default().merge(tx_requests);
            tx_ids.push(tx.id());
        }

        let mut verified = self.verified.write().map_err(|_| poisoned())?;
        verified.insert(
            block_hash,
            PinnedRequests {
                height,
                tx_ids,
                requests,
            },
        );
        debug!("pinned atomic state for block {block_hash} at height {height}");
        Ok(())
    }

    pub fn is_staged(&self, block_hash: &Id) -> bool {
        match self.verified.read() {
            Ok(verified) => verified.contains_key(block_hash),
            Err(_) => {
                log::error!("Failed to acquire read lock on atomic backend");
                false
            }
        }
    }

    pub fn staged_count(&self) -> usize {
        match self.verified.read() {
            Ok(verified) => verified.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on atomic backend");
                0
            }
        }
    }

    /// Staged view of a verified block. A missing view means the block was
    /// never verified, which callers must not hit.
    pub fn staged_state(&self, block_hash: &Id) -> Result<StagedAtomicState<'_>> {
        let verified = self.verified.read().map_err(|_| poisoned())?;
        let pinned = verified.get(block_hash).cloned().ok_or_else(|| {
            BlockchainError::EngineInvariantViolation(format!(
                "no staged atomic state for block {block_hash}"
            ))
        })?;
        Ok(StagedAtomicState {
            backend: self,
            block_hash: *block_hash,
            pinned,
        })
    }

    fn unpin(&self, block_hash: &Id) -> Result<()> {
        let mut verified = self.verified.write().map_err(|_| poisoned())?;
        verified.remove(block_hash).map(|_| ()).ok_or_else(|| {
            BlockchainError::EngineInvariantViolation(format!(
                "atomic state for block {block_hash} already finalized"
            ))
        })
    }
}

fn poisoned() -> BlockchainError {
    BlockchainError::Database("atomic backend lock poisoned".to_string())
}

pub struct StagedAtomicState<'a> {
    backend: &'a AtomicBackend,
    block_hash: Id,
    pinned: PinnedRequests,
}

impl StagedAtomicState<'_> {
    pub fn block_hash(&self) -> Id {
        self.block_hash
    }

    pub fn requests(&self) -> &BTreeMap<Id, AtomicRequests> {
        &self.pinned.requests
    }

    /// Indexes the block's transactions into `batch`, commits the batch
    /// through `chain` and applies the requests to shared memory.
    pub fn accept(self, mut batch: Batch, chain: &dyn LocalChain) -> Result<()> {
        let height = self.pinned.height;
        for tx_id in &self.pinned.tx_ids {
            batch.insert(tx_height_key(tx_id), &height.to_be_bytes()[..]);
        }
        if !self.pinned.requests.is_empty() {
            batch.insert(height_ops_key(height), serialize(&self.pinned.requests)?);
        }

        // bonus requests were already applied by the chain that originally
        // accepted the block
        let bonus = self.backend.is_bonus(height, &self.block_hash);
        if !bonus {
            self.check_removals()?;
        }

        chain.commit(&self.block_hash, batch)?;

        if bonus {
            info!(
                "indexed bonus block {} without touching shared memory",
                self.block_hash
            );
        } else if !self.pinned.requests.is_empty() {
            self.backend.shared_memory.apply(&self.pinned.requests)?;
        }

        self.backend.unpin(&self.block_hash)
    }

    /// Every record the block consumes must still be in shared memory
    /// before anything is committed.
    fn check_removals(&self) -> Result<()> {
        for (peer_chain, request) in &self.pinned.requests {
            if !request.remove_requests.is_empty() {
                self.backend
                    .shared_memory
                    .get(peer_chain, &request.remove_requests)?;
            }
        }
        Ok(())
    }

    pub fn reject(self) -> Result<()> {
        debug!("unpinning atomic state for block {}", self.block_hash);
        self.backend.unpin(&self.block_hash)
    }
}

/// Decodes a value stored under [`height_ops_key`]
pub fn decode_height_ops(bytes: &[u8]) -> Result<BTreeMap<Id, AtomicRequests>> {
    deserialize(bytes)
}
