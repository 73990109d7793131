// Inputs, outputs and the cross-chain UTXO record they produce or consume.
// Local-ledger sides (EvmInput / EvmOutput) address accounts; shared-memory
// sides (Transferable*) address UTXOs owned by short ids.

use crate::core::atomic::Element;
use crate::core::{Address, Id, ShortId};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};

/// Reference to output `output_index` of transaction `tx_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct UtxoId {
    pub tx_id: Id,
    pub output_index: u32,
}

impl UtxoId {
    pub fn new(tx_id: Id, output_index: u32) -> UtxoId {
        UtxoId {
            tx_id,
            output_index,
        }
    }

    /// Key of the record in shared memory
    pub fn input_id(&self) -> Id {
        self.tx_id.prefix(self.output_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addrs: Vec<ShortId>,
}

impl OutputOwners {
    pub fn single(owner: ShortId) -> OutputOwners {
        OutputOwners {
            locktime: 0,
            threshold: 1,
            addrs: vec![owner],
        }
    }

    pub fn verify(&self) -> Result<()> {
        if self.threshold as usize > self.addrs.len() {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "output threshold {} exceeds {} owners",
                self.threshold,
                self.addrs.len()
            )));
        }
        if self.threshold == 0 {
            return Err(BlockchainError::InvalidTransactionStructure(
                "output threshold must be positive".to_string(),
            ));
        }
        if !self.addrs.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(BlockchainError::InvalidTransactionStructure(
                "output owners must be sorted and unique".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TransferOutput {
    pub amount: u64,
    pub owners: OutputOwners,
}

/// Output exported into shared memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub output: TransferOutput,
}

/// Shared-memory UTXO consumed by an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub amount: u64,
    pub sig_indices: Vec<u32>,
}

/// Local-ledger debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct EvmInput {
    pub address: Address,
    pub amount: u64,
    pub asset_id: Id,
    pub nonce: u64,
}

impl EvmInput {
    /// Identifies the (address, nonce) pair this input spends
    pub fn input_id(&self) -> Id {
        let mut data = self.address.as_bytes().to_vec();
        data.extend_from_slice(&self.nonce.to_be_bytes());
        Id::hash_of(&data)
    }
}

/// Local-ledger credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct EvmOutput {
    pub address: Address,
    pub amount: u64,
    pub asset_id: Id,
}

/// Cross-chain UTXO record as stored in shared memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub output: TransferOutput,
}

impl Utxo {
    pub fn to_element(&self) -> Result<Element> {
        Ok(Element {
            key: self.utxo_id.input_id().to_vec(),
            value: serialize(self)?,
            traits: self
                .output
                .owners
                .addrs
                .iter()
                .map(|addr| addr.as_bytes().to_vec())
                .collect(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Utxo> {
        deserialize(bytes)
    }
}
