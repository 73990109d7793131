//! Cross-chain shared memory
//!
//! Records live in directed buckets: a record exported by chain A to chain B
//! sits in bucket (A, B). Chain B reads and removes it from there; chain A
//! only ever writes into it.

use crate::core::atomic::{AtomicRequests, Element};
use crate::core::Id;
use crate::error::{BlockchainError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Shared memory as seen from one chain
pub trait SharedMemory: Send + Sync {
    /// Values of records `peer_chain` exported to this chain, in key order.
    /// Fails with `MissingCrossChainRecord` if any key is absent.
    fn get(&self, peer_chain: &Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>>;

    /// Applies all requests or none of them.
    fn apply(&self, requests: &BTreeMap<Id, AtomicRequests>) -> Result<()>;
}

type Bucket = BTreeMap<Vec<u8>, Element>;

/// In-process shared memory for every chain of a network
#[derive(Clone, Default)]
pub struct SharedLedger {
    buckets: Arc<RwLock<HashMap<(Id, Id), Bucket>>>,
}

impl SharedLedger {
    pub fn new() -> SharedLedger {
        SharedLedger::default()
    }

    pub fn chain(&self, chain_id: Id) -> ChainSharedMemory {
        ChainSharedMemory {
            chain_id,
            ledger: self.clone(),
        }
    }

    /// Writes a record as if `from` had exported it to `to`
    pub fn put(&self, from: Id, to: Id, element: Element) -> Result<()> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        buckets
            .entry((from, to))
            .or_default()
            .insert(element.key.clone(), element);
        Ok(())
    }

    pub fn contains(&self, from: Id, to: Id, key: &[u8]) -> bool {
        match self.buckets.read() {
            Ok(buckets) => buckets
                .get(&(from, to))
                .is_some_and(|bucket| bucket.contains_key(key)),
            Err(_) => {
                log::error!("Failed to acquire read lock on shared memory");
                false
            }
        }
    }

    pub fn len(&self, from: Id, to: Id) -> usize {
        match self.buckets.read() {
            Ok(buckets) => buckets.get(&(from, to)).map_or(0, |bucket| bucket.len()),
            Err(_) => {
                log::error!("Failed to acquire read lock on shared memory");
                0
            }
        }
    }
}

fn poisoned() -> BlockchainError {
    BlockchainError::Database("shared memory lock poisoned".to_string())
}

fn missing(peer_chain: &Id, key: &[u8]) -> BlockchainError {
    BlockchainError::MissingCrossChainRecord(format!(
        "{} from chain {peer_chain}",
        hex::encode(key)
    ))
}

/// Handle bound to one chain
#[derive(Clone)]
pub struct ChainSharedMemory {
    chain_id: Id,
    ledger: SharedLedger,
}

impl ChainSharedMemory {
    pub fn chain_id(&self) -> Id {
        self.chain_id
    }
}

impl SharedMemory for ChainSharedMemory {
    fn get(&self, peer_chain: &Id, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let buckets = self.ledger.buckets.read().map_err(|_| poisoned())?;
        let bucket = buckets.get(&(*peer_chain, self.chain_id));
        keys.iter()
            .map(|key| {
                bucket
                    .and_then(|b| b.get(key))
                    .map(|element| element.value.clone())
                    .ok_or_else(|| missing(peer_chain, key))
            })
            .collect()
    }

    fn apply(&self, requests: &BTreeMap<Id, AtomicRequests>) -> Result<()> {
        let mut buckets = self.ledger.buckets.write().map_err(|_| poisoned())?;

        for (peer_chain, request) in requests {
            let inbound = buckets.get(&(*peer_chain, self.chain_id));
            for key in &request.remove_requests {
                if !inbound.is_some_and(|b| b.contains_key(key)) {
                    return Err(missing(peer_chain, key));
                }
            }
        }

        for (peer_chain, request) in requests {
            if let Some(inbound) = buckets.get_mut(&(*peer_chain, self.chain_id)) {
                for key in &request.remove_requests {
                    inbound.remove(key);
                }
            }
            let outbound = buckets.entry((self.chain_id, *peer_chain)).or_default();
            for element in &request.put_requests {
                outbound.insert(element.key.clone(), element.clone());
            }
        }
        Ok(())
    }
}
