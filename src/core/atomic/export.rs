// Export: debits local accounts and produces UTXOs for a peer chain.

use crate::config::Config;
use crate::core::atomic::{
    ensure_unique, verify_chain_fields, verify_flow, verify_native_asset, AtomicRequests,
    EvmInput, TransferableOutput, Utxo, UtxoId,
};
use crate::core::{Id, Rules};
use crate::error::{BlockchainError, Result};
use crate::storage::StateDb;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct UnsignedExportTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub destination_chain: Id,
    pub ins: Vec<EvmInput>,
    pub exported_outputs: Vec<TransferableOutput>,
}

impl UnsignedExportTx {
    pub fn verify(&self, config: &Config, _rules: &Rules) -> Result<()> {
        self.verify_with_fee(config, config.atomic_tx_fee)
    }

    pub(crate) fn verify_with_fee(&self, config: &Config, fee: u64) -> Result<()> {
        verify_chain_fields(
            self.network_id,
            &self.blockchain_id,
            &self.destination_chain,
            config,
        )?;

        if self.ins.is_empty() {
            return Err(BlockchainError::InvalidTransactionStructure(
                "export tx has no inputs".to_string(),
            ));
        }
        if self.exported_outputs.is_empty() {
            return Err(BlockchainError::InvalidTransactionStructure(
                "export tx has no exported outputs".to_string(),
            ));
        }

        for input in &self.ins {
            verify_native_asset(&input.asset_id, config)?;
            if input.amount == 0 {
                return Err(BlockchainError::InvalidTransactionStructure(
                    "export input has no value".to_string(),
                ));
            }
        }
        for out in &self.exported_outputs {
            verify_native_asset(&out.asset_id, config)?;
            if out.output.amount == 0 {
                return Err(BlockchainError::InvalidTransactionStructure(
                    "exported output has no value".to_string(),
                ));
            }
            out.output.owners.verify()?;
        }

        ensure_unique(&self.input_ids(), "export input")?;
        verify_flow(
            self.ins.iter().map(|input| input.amount),
            self.exported_outputs.iter().map(|out| out.output.amount),
            fee,
        )
    }

    pub fn input_ids(&self) -> Vec<Id> {
        self.ins.iter().map(EvmInput::input_id).collect()
    }

    /// One put request per exported output, keyed by (tx id, output index).
    pub fn atomic_ops(&self, tx_id: Id) -> Result<(Id, AtomicRequests)> {
        let mut put_requests = Vec::with_capacity(self.exported_outputs.len());
        for (index, out) in self.exported_outputs.iter().enumerate() {
            let utxo = Utxo {
                utxo_id: UtxoId::new(tx_id, index as u32),
                asset_id: out.asset_id,
                output: out.output.clone(),
            };
            put_requests.push(utxo.to_element()?);
        }
        Ok((
            self.destination_chain,
            AtomicRequests {
                remove_requests: vec![],
                put_requests,
            },
        ))
    }

    pub fn state_transfer(&self, config: &Config, state: &mut StateDb) -> Result<()> {
        for input in &self.ins {
            let amount = input.amount as u128 * config.x2c_rate as u128;
            let balance = state.get_balance(&input.address);
            if balance < amount {
                return Err(BlockchainError::InsufficientFunds {
                    required: amount,
                    available: balance,
                });
            }
            let nonce = state.get_nonce(&input.address);
            if nonce != input.nonce {
                return Err(BlockchainError::InvalidNonce {
                    expected: nonce,
                    actual: input.nonce,
                });
            }

            state.sub_balance(&input.address, amount)?;
            state.set_nonce(&input.address, nonce + 1);
        }
        Ok(())
    }
}
