//! Test utilities for ledger testing

use crate::config::{Config, GenesisAccount};
use crate::core::atomic::{
    encode_atomic_txs, Credential, EvmInput, EvmOutput, OutputOwners, TransferOutput,
    TransferableInput, TransferableOutput, Tx, UnsignedAtomicTx, UnsignedExportTx,
    UnsignedImportTx, Utxo, UtxoId, REWARD_SOURCE_ADDRESS,
};
use crate::core::{Address, Block, BlockBody, BonusBlocks, Engine, Id, ShortId};
use crate::error::{BlockchainError, Result};
use crate::storage::SharedLedger;
use std::sync::Arc;
use tempfile::TempDir;

pub const USER: Address = Address::new([0x11; 20]);
pub const PEER_OWNER: ShortId = ShortId::new([0x22; 20]);

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Local config with a distinct platform chain and funded accounts
pub fn test_config(user_balance: u64, reward_source_balance: u64) -> Config {
    let mut config = Config::default();
    config.platform_chain_id = Id::hash_of(b"test-platform-chain");
    config.genesis.alloc = vec![
        GenesisAccount {
            address: USER,
            balance: user_balance,
        },
        GenesisAccount {
            address: REWARD_SOURCE_ADDRESS,
            balance: reward_source_balance,
        },
    ];
    config
}

pub struct TestEngine {
    pub engine: Engine,
    pub ledger: SharedLedger,
    _dir: TempDir,
}

pub fn create_test_engine(config: Config) -> Result<TestEngine> {
    create_test_engine_with_bonus(config, BonusBlocks::default())
}

pub fn create_test_engine_with_bonus(config: Config, bonus: BonusBlocks) -> Result<TestEngine> {
    let dir = create_temp_dir()?;
    let ledger = SharedLedger::new();
    let shared_memory = Arc::new(ledger.chain(config.chain_id));
    let engine = Engine::open_with(config, &dir.path().join("chain"), shared_memory, bonus)?;
    engine.set_bootstrapped(true);
    Ok(TestEngine {
        engine,
        ledger,
        _dir: dir,
    })
}

/// Body of a child of `parent` carrying `txs` in batch format
pub fn child_body(parent: &Block, timestamp: u64, txs: &[Tx]) -> Result<BlockBody> {
    Ok(BlockBody {
        parent_id: parent.id(),
        height: parent.height() + 1,
        timestamp,
        base_fee: Some(0),
        ext_data: encode_atomic_txs(txs, true)?,
    })
}

/// Puts a UTXO the platform chain exported to this chain
pub fn seed_utxo(ledger: &SharedLedger, config: &Config, seed: &[u8], amount: u64) -> Result<UtxoId> {
    let utxo = Utxo {
        utxo_id: UtxoId::new(Id::hash_of(seed), 0),
        asset_id: config.asset_id,
        output: TransferOutput {
            amount,
            owners: OutputOwners::single(PEER_OWNER),
        },
    };
    ledger.put(config.platform_chain_id, config.chain_id, utxo.to_element()?)?;
    Ok(utxo.utxo_id)
}

pub fn import_tx(config: &Config, utxo_id: UtxoId, amount: u64, to: Address) -> Tx {
    Tx::new(
        UnsignedAtomicTx::Import(UnsignedImportTx {
            network_id: config.network_id,
            blockchain_id: config.chain_id,
            source_chain: config.platform_chain_id,
            imported_inputs: vec![TransferableInput {
                utxo_id,
                asset_id: config.asset_id,
                amount,
                sig_indices: vec![0],
            }],
            outs: vec![EvmOutput {
                address: to,
                amount: amount - config.atomic_tx_fee,
                asset_id: config.asset_id,
            }],
        }),
        vec![Credential {
            signatures: vec![vec![0u8; 65]],
        }],
    )
}

pub fn export_tx(config: &Config, from: Address, amount: u64, nonce: u64) -> Tx {
    Tx::new(
        UnsignedAtomicTx::Export(UnsignedExportTx {
            network_id: config.network_id,
            blockchain_id: config.chain_id,
            destination_chain: config.platform_chain_id,
            ins: vec![EvmInput {
                address: from,
                amount,
                asset_id: config.asset_id,
                nonce,
            }],
            exported_outputs: vec![TransferableOutput {
                asset_id: config.asset_id,
                output: TransferOutput {
                    amount: amount - config.atomic_tx_fee,
                    owners: OutputOwners::single(PEER_OWNER),
                },
            }],
        }),
        vec![Credential {
            signatures: vec![vec![0u8; 65]],
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SharedMemory;

    #[test]
    fn test_create_test_engine() {
        let test = create_test_engine(test_config(10_000, 0)).unwrap();
        let genesis = test.engine.chain().last_accepted_block().unwrap();
        assert_eq!(genesis.height(), 0);
        assert_eq!(test.engine.last_accepted(), genesis.id());

        let state = test.engine.accepted_state().unwrap();
        assert_eq!(
            state.get_balance(&USER),
            10_000 * test.engine.config().x2c_rate as u128
        );
    }

    #[test]
    fn test_seeded_utxo_is_visible_to_this_chain() {
        let config = test_config(0, 0);
        let ledger = SharedLedger::new();
        let utxo_id = seed_utxo(&ledger, &config, b"seed", 5_000).unwrap();
        let values = ledger
            .chain(config.chain_id)
            .get(&config.platform_chain_id, &[utxo_id.input_id().to_vec()])
            .unwrap();
        assert_eq!(Utxo::from_bytes(&values[0]).unwrap().output.amount, 5_000);
    }

    #[test]
    fn test_fixture_txs_are_well_formed() {
        let config = test_config(0, 0);
        let rules = crate::core::RuleResolver::new(config.forks.clone()).rules(1, 1);
        import_tx(&config, UtxoId::new(Id::hash_of(b"x"), 0), 5_000, USER)
            .verify(&config, &rules)
            .unwrap();
        export_tx(&config, USER, 5_000, 0).verify(&config, &rules).unwrap();
    }
}
