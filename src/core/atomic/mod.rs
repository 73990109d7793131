//! Atomic transactions
//!
//! An atomic transaction moves value between the local account ledger and the
//! shared cross-chain memory. Every variant produces:
//! - a set of shared-memory requests for one peer chain ([`Tx::atomic_ops`]),
//! - a local-ledger state transfer ([`Tx::state_transfer`]).
//!
//! Transactions travel inside a block's `ext_data`: a single encoded [`Tx`]
//! before batch rules, an encoded `Vec<Tx>` after.

pub mod collect_rewards;
pub mod export;
pub mod import;
pub mod utxo;

pub use collect_rewards::{
    UnsignedCollectRewardsTx, BALANCE_SLOT, FEE_REWARD_ADDRESS, FEE_REWARD_SHORT_ID,
    REWARD_SOURCE_ADDRESS, TIMESTAMP_SLOT,
};
pub use export::UnsignedExportTx;
pub use import::UnsignedImportTx;
pub use utxo::{
    EvmInput, EvmOutput, OutputOwners, TransferOutput, TransferableInput, TransferableOutput,
    Utxo, UtxoId,
};

use crate::config::Config;
use crate::core::{BlockBody, Id, Rules};
use crate::error::{BlockchainError, Result};
use crate::storage::{SharedMemory, StateDb};
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Keyed record written to shared memory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Element {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub traits: Vec<Vec<u8>>,
}

/// Shared-memory mutations against one peer chain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct AtomicRequests {
    pub remove_requests: Vec<Vec<u8>>,
    pub put_requests: Vec<Element>,
}

impl AtomicRequests {
    pub fn merge(&mut self, other: AtomicRequests) {
        self.remove_requests.extend(other.remove_requests);
        self.put_requests.extend(other.put_requests);
    }

    pub fn is_empty(&self) -> bool {
        self.remove_requests.is_empty() && self.put_requests.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Credential {
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum UnsignedAtomicTx {
    Import(UnsignedImportTx),
    Export(UnsignedExportTx),
    CollectRewards(UnsignedCollectRewardsTx),
}

/// What a transaction sees while it is verified and executed inside a block
pub struct ExecutionEnv<'a> {
    pub config: &'a Config,
    pub rules: Rules,
    pub shared_memory: &'a dyn SharedMemory,
    pub block: &'a BlockBody,
    pub bootstrapped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Tx {
    pub unsigned: UnsignedAtomicTx,
    pub credentials: Vec<Credential>,
}

impl Tx {
    pub fn new(unsigned: UnsignedAtomicTx, credentials: Vec<Credential>) -> Tx {
        Tx {
            unsigned,
            credentials,
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Tx> {
        deserialize(bytes)
    }

    /// sha256 of the signed encoding
    pub fn id(&self) -> Id {
        match self.bytes() {
            Ok(bytes) => Id::hash_of(&bytes),
            Err(e) => {
                log::error!("Atomic transaction serialization failed during id calculation: {e}");
                Id::hash_of(b"atomic_tx_serialization_error")
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.unsigned {
            UnsignedAtomicTx::Import(_) => "import",
            UnsignedAtomicTx::Export(_) => "export",
            UnsignedAtomicTx::CollectRewards(_) => "collect_rewards",
        }
    }

    pub fn is_collect_rewards(&self) -> bool {
        matches!(self.unsigned, UnsignedAtomicTx::CollectRewards(_))
    }

    /// Ids of everything this transaction spends; two transactions conflict
    /// when they share one.
    pub fn input_ids(&self) -> Vec<Id> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(utx) => utx.input_ids(),
            UnsignedAtomicTx::Export(utx) => utx.input_ids(),
            UnsignedAtomicTx::CollectRewards(utx) => utx.export.input_ids(),
        }
    }

    /// Context-free checks against the given rules
    pub fn verify(&self, config: &Config, rules: &Rules) -> Result<()> {
        let (expected, name) = match &self.unsigned {
            UnsignedAtomicTx::Import(utx) => {
                utx.verify(config, rules)?;
                (utx.imported_inputs.len(), "import")
            }
            UnsignedAtomicTx::Export(utx) => {
                utx.verify(config, rules)?;
                (utx.ins.len(), "export")
            }
            UnsignedAtomicTx::CollectRewards(utx) => {
                utx.verify(config, rules)?;
                (0, "collect rewards")
            }
        };

        if self.credentials.len() != expected {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "{name} tx has {} credentials, expected {expected}",
                self.credentials.len()
            )));
        }
        Ok(())
    }

    /// Peer chain and the shared-memory requests against it
    pub fn atomic_ops(&self) -> Result<(Id, AtomicRequests)> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(utx) => Ok(utx.atomic_ops()),
            UnsignedAtomicTx::Export(utx) => utx.atomic_ops(self.id()),
            UnsignedAtomicTx::CollectRewards(utx) => utx.atomic_ops(self.id()),
        }
    }

    /// Checks that depend on the parent state and on shared memory
    pub fn semantic_verify(&mut self, env: &ExecutionEnv<'_>, state: &StateDb) -> Result<()> {
        self.verify(env.config, &env.rules)?;
        match &mut self.unsigned {
            UnsignedAtomicTx::Import(utx) => utx.semantic_verify(env),
            UnsignedAtomicTx::Export(_) => Ok(()),
            UnsignedAtomicTx::CollectRewards(utx) => utx.semantic_verify(env, state),
        }
    }

    /// Applies the local-ledger side of the transaction
    pub fn state_transfer(&self, env: &ExecutionEnv<'_>, state: &mut StateDb) -> Result<()> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(utx) => utx.state_transfer(env.config, state),
            UnsignedAtomicTx::Export(utx) => utx.state_transfer(env.config, state),
            UnsignedAtomicTx::CollectRewards(utx) => utx.state_transfer(env.config, state),
        }
    }
}

/// Decodes the atomic transactions carried in a block's `ext_data`
pub fn extract_atomic_txs(ext_data: &[u8], batch: bool) -> Result<Vec<Tx>> {
    if ext_data.is_empty() {
        return Ok(vec![]);
    }
    if batch {
        deserialize::<Vec<Tx>>(ext_data)
    } else {
        Ok(vec![Tx::from_bytes(ext_data)?])
    }
}

/// Inverse of [`extract_atomic_txs`]
pub fn encode_atomic_txs(txs: &[Tx], batch: bool) -> Result<Vec<u8>> {
    if batch {
        if txs.is_empty() {
            return Ok(vec![]);
        }
        return serialize(&txs.to_vec());
    }
    match txs {
        [] => Ok(vec![]),
        [tx] => tx.bytes(),
        _ => Err(BlockchainError::InvalidBlock(format!(
            "{} atomic transactions require batch rules",
            txs.len()
        ))),
    }
}

// Shared by every variant: network, own chain and peer chain.
pub(crate) fn verify_chain_fields(
    network_id: u32,
    blockchain_id: &Id,
    peer_chain: &Id,
    config: &Config,
) -> Result<()> {
    if network_id != config.network_id {
        return Err(BlockchainError::InvalidTransactionStructure(format!(
            "wrong network id {network_id}, expected {}",
            config.network_id
        )));
    }
    if *blockchain_id != config.chain_id {
        return Err(BlockchainError::InvalidTransactionStructure(format!(
            "wrong blockchain id {blockchain_id}"
        )));
    }
    if *peer_chain == config.chain_id {
        return Err(BlockchainError::InvalidTransactionStructure(
            "peer chain must differ from this chain".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn verify_native_asset(asset_id: &Id, config: &Config) -> Result<()> {
    if *asset_id != config.asset_id {
        return Err(BlockchainError::InvalidTransactionStructure(format!(
            "asset {asset_id} is not the native asset"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_unique(ids: &[Id], what: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "duplicate {what} {id}"
            )));
        }
    }
    Ok(())
}

/// Inputs must cover outputs plus the fee
pub(crate) fn verify_flow(
    inputs: impl Iterator<Item = u64>,
    outputs: impl Iterator<Item = u64>,
    fee: u64,
) -> Result<()> {
    let overflow =
        || BlockchainError::InvalidTransactionStructure("amount overflow".to_string());
    let mut consumed = 0u64;
    for amount in inputs {
        consumed = consumed.checked_add(amount).ok_or_else(overflow)?;
    }
    let mut produced = fee;
    for amount in outputs {
        produced = produced.checked_add(amount).ok_or_else(overflow)?;
    }
    if consumed < produced {
        return Err(BlockchainError::InvalidTransactionStructure(format!(
            "flow check failed: consumed {consumed} < produced {produced} (fee {fee})"
        )));
    }
    Ok(())
}
