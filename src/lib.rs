//! # Atomic Ledger
//!
//! Block verification and cross-chain atomic transactions for a ledger
//! engine driven by an external consensus process.
//!
//! ## What is here
//! - **Block lifecycle**: verify (syntactic, cross-chain presence, execution),
//!   accept and reject, with deferred syntax checks for out-of-order children
//! - **Atomic transactions**: Import, Export and CollectRewards, each with its
//!   shared-memory requests and local state transfer
//! - **Atomic backend**: per-block staging of shared-memory requests,
//!   committed with the accepted-chain batch or dropped on reject
//! - **Reward trigger**: periodic distribution of collected fees
//!
//! ## How the code is organized
//! - `core/`: blocks, rules, atomic transactions, the local chain and the engine
//! - `storage/`: account state, shared memory, atomic backend, memory pool
//! - `config/`: node configuration loaded from TOML
//! - `utils/`: hashing, cb58 and bincode helpers
//! - `cli/`: command-line interface of the binary
//!
//! ## Where to start
//! 1. `core/engine.rs` for how the pieces are wired
//! 2. `core/block.rs` for verify / accept / reject
//! 3. `core/atomic/` for the transaction variants

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, Network, RewardConfig};
pub use core::atomic::{Tx, UnsignedAtomicTx};
pub use core::{
    Address, Block, BlockBody, Blockchain, ChainContext, Engine, Id, LocalChain, PostAcceptHook,
    ShortId, Status,
};
pub use error::{BlockchainError, Result};
pub use storage::{MemoryPool, Mempool, SharedLedger, SharedMemory, StateDb};
pub use utils::{cb58_decode, cb58_encode, current_timestamp, sha256_digest};
