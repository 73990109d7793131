//! Data storage and persistence
//!
//! Account state of the local ledger, cross-chain shared memory, staging of
//! atomic effects per verified block, and the memory pool of pending atomic
//! transactions.

pub mod atomic_backend;
pub mod memory_pool;
pub mod shared_memory;
pub mod state;

pub use atomic_backend::{AtomicBackend, StagedAtomicState};
pub use memory_pool::{Mempool, MemoryPool};
pub use shared_memory::{ChainSharedMemory, SharedLedger, SharedMemory};
pub use state::{Account, StateDb, StorageSlot};
