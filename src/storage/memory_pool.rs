use crate::core::atomic::Tx;
use crate::core::Id;
use crate::error::{BlockchainError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Pending atomic transactions as the engine sees them
pub trait Mempool: Send + Sync {
    fn remove_tx(&self, tx_id: &Id);

    fn issue_tx(&self, tx: Tx, local: bool) -> Result<()>;

    /// Transactions in issue order
    fn pending_txs(&self) -> Vec<Tx>;
}

struct PoolEntry {
    tx: Tx,
    local: bool,
}

#[derive(Default)]
struct PoolInner {
    entries: HashMap<Id, PoolEntry>,
    // input id -> tx id spending it
    spenders: HashMap<Id, Id>,
    order: Vec<Id>,
}

/// ( K -> tx id, V => pending atomic transaction )
pub struct MemoryPool {
    inner: RwLock<PoolInner>,
    max_size: usize,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new(crate::config::MempoolConfig::default().max_size)
    }
}

impl MemoryPool {
    pub fn new(max_size: usize) -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(PoolInner::default()),
            max_size,
        }
    }

    pub fn get(&self, tx_id: &Id) -> Option<Tx> {
        match self.inner.read() {
            Ok(pool) => pool.entries.get(tx_id).map(|entry| entry.tx.clone()),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    pub fn contains(&self, tx_id: &Id) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.entries.contains_key(tx_id),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    /// Whether the entry was issued by this node rather than re-issued
    pub fn is_local(&self, tx_id: &Id) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.entries.get(tx_id).is_some_and(|entry| entry.local),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.entries.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.entries.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                true // Conservative default
            }
        }
    }

    pub fn clear(&self) {
        match self.inner.write() {
            Ok(mut pool) => {
                *pool = PoolInner::default();
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }
}

impl Mempool for MemoryPool {
    fn remove_tx(&self, tx_id: &Id) {
        match self.inner.write() {
            Ok(mut pool) => {
                if let Some(entry) = pool.entries.remove(tx_id) {
                    for input in entry.tx.input_ids() {
                        pool.spenders.remove(&input);
                    }
                    pool.order.retain(|id| id != tx_id);
                }
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    fn issue_tx(&self, tx: Tx, local: bool) -> Result<()> {
        let tx_id = tx.id();
        let inputs = tx.input_ids();
        let mut pool = self
            .inner
            .write()
            .map_err(|_| BlockchainError::Mempool("memory pool lock poisoned".to_string()))?;

        if pool.entries.contains_key(&tx_id) {
            return Err(BlockchainError::Mempool(format!(
                "transaction {tx_id} already pending"
            )));
        }
        if let Some(other) = inputs.iter().find_map(|input| pool.spenders.get(input)) {
            return Err(BlockchainError::Mempool(format!(
                "transaction {tx_id} conflicts with pending {other}"
            )));
        }
        if pool.entries.len() >= self.max_size {
            return Err(BlockchainError::Mempool(format!(
                "memory pool full ({} transactions)",
                self.max_size
            )));
        }

        let kind = tx.kind();
        for input in inputs {
            pool.spenders.insert(input, tx_id);
        }
        pool.order.push(tx_id);
        pool.entries.insert(tx_id, PoolEntry { tx, local });
        log::debug!("added {kind} transaction {tx_id} to memory pool (local: {local})");
        Ok(())
    }

    fn pending_txs(&self) -> Vec<Tx> {
        match self.inner.read() {
            Ok(pool) => pool
                .order
                .iter()
                .filter_map(|id| pool.entries.get(id).map(|entry| entry.tx.clone()))
                .collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }
}
