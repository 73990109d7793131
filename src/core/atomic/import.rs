// Import: consumes UTXOs another chain exported to us and credits local accounts.

use crate::config::Config;
use crate::core::atomic::{
    ensure_unique, verify_chain_fields, verify_flow, verify_native_asset, AtomicRequests,
    EvmOutput, ExecutionEnv, TransferableInput, Utxo,
};
use crate::core::{Id, Rules};
use crate::error::{BlockchainError, Result};
use crate::storage::StateDb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct UnsignedImportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
    pub outs: Vec<EvmOutput>,
}

impl UnsignedImportTx {
    pub fn verify(&self, config: &Config, _rules: &Rules) -> Result<()> {
        verify_chain_fields(self.network_id, &self.blockchain_id, &self.source_chain, config)?;

        if self.imported_inputs.is_empty() {
            return Err(BlockchainError::InvalidTransactionStructure(
                "import tx has no imported inputs".to_string(),
            ));
        }
        if self.outs.is_empty() {
            return Err(BlockchainError::InvalidTransactionStructure(
                "import tx has no outputs".to_string(),
            ));
        }

        for input in &self.imported_inputs {
            verify_native_asset(&input.asset_id, config)?;
            if input.amount == 0 {
                return Err(BlockchainError::InvalidTransactionStructure(
                    "imported input has no value".to_string(),
                ));
            }
        }
        for out in &self.outs {
            verify_native_asset(&out.asset_id, config)?;
            if out.amount == 0 {
                return Err(BlockchainError::InvalidTransactionStructure(
                    "import output has no value".to_string(),
                ));
            }
        }

        ensure_unique(&self.input_ids(), "imported utxo")?;
        verify_flow(
            self.imported_inputs.iter().map(|input| input.amount),
            self.outs.iter().map(|out| out.amount),
            config.atomic_tx_fee,
        )
    }

    pub fn input_ids(&self) -> Vec<Id> {
        self.imported_inputs
            .iter()
            .map(|input| input.utxo_id.input_id())
            .collect()
    }

    pub fn atomic_ops(&self) -> (Id, AtomicRequests) {
        let remove_requests = self
            .input_ids()
            .iter()
            .map(|id| id.to_vec())
            .collect();
        (
            self.source_chain,
            AtomicRequests {
                remove_requests,
                put_requests: vec![],
            },
        )
    }

    /// Every imported UTXO must exist in shared memory and match its input.
    pub fn semantic_verify(&self, env: &ExecutionEnv<'_>) -> Result<()> {
        // shared memory is not reliable until the node has caught up
        if !env.bootstrapped {
            return Ok(());
        }

        let keys: Vec<Vec<u8>> = self.input_ids().iter().map(|id| id.to_vec()).collect();
        let values = env.shared_memory.get(&self.source_chain, &keys)?;

        for (input, value) in self.imported_inputs.iter().zip(values.iter()) {
            let utxo = Utxo::from_bytes(value)?;
            if utxo.asset_id != input.asset_id {
                return Err(BlockchainError::InvalidTransactionStructure(format!(
                    "utxo {} holds asset {}, input declares {}",
                    input.utxo_id.input_id(),
                    utxo.asset_id,
                    input.asset_id
                )));
            }
            if utxo.output.amount != input.amount {
                return Err(BlockchainError::InvalidTransactionStructure(format!(
                    "utxo {} holds {}, input declares {}",
                    input.utxo_id.input_id(),
                    utxo.output.amount,
                    input.amount
                )));
            }
        }
        Ok(())
    }

    pub fn state_transfer(&self, config: &Config, state: &mut StateDb) -> Result<()> {
        for out in &self.outs {
            let amount = out.amount as u128 * config.x2c_rate as u128;
            log::debug!("crediting {} with {amount} from import", out.address);
            state.add_balance(&out.address, amount)?;
        }
        Ok(())
    }
}
