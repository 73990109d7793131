//! Block lifecycle integration tests
//!
//! Drives the engine through verify / accept / reject against an in-process
//! shared memory, covering imports, exports and the reward trigger.

use atomic_ledger::config::GenesisAccount;
use atomic_ledger::core::atomic::{
    encode_atomic_txs, AtomicRequests, Credential, EvmInput, EvmOutput, OutputOwners,
    TransferOutput, TransferableInput, TransferableOutput, UnsignedExportTx, UnsignedImportTx,
    Utxo, UtxoId, BALANCE_SLOT, FEE_REWARD_ADDRESS, REWARD_SOURCE_ADDRESS, TIMESTAMP_SLOT,
};
use atomic_ledger::core::{BonusBlocks, LocalChain};
use atomic_ledger::{
    Address, Block, BlockBody, BlockchainError, Config, Engine, Id, Mempool, SharedLedger,
    SharedMemory, ShortId, Status, Tx, UnsignedAtomicTx,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const USER: Address = Address::new([0x11; 20]);
const OWNER: ShortId = ShortId::new([0x22; 20]);

fn config(user: u64, reward_source: u64) -> Config {
    let mut config = Config::default();
    config.platform_chain_id = Id::hash_of(b"platform");
    config.genesis.alloc = vec![
        GenesisAccount {
            address: USER,
            balance: user,
        },
        GenesisAccount {
            address: REWARD_SOURCE_ADDRESS,
            balance: reward_source,
        },
    ];
    config
}

fn open(config: Config, dir: &TempDir, ledger: &SharedLedger) -> Engine {
    let shared_memory = Arc::new(ledger.chain(config.chain_id));
    let engine = Engine::open_with(
        config,
        &dir.path().join("chain"),
        shared_memory,
        BonusBlocks::default(),
    )
    .unwrap();
    engine.set_bootstrapped(true);
    engine
}

fn child(engine: &Engine, parent: &Block, timestamp: u64, txs: &[Tx]) -> Block {
    let body = BlockBody {
        parent_id: parent.id(),
        height: parent.height() + 1,
        timestamp,
        base_fee: Some(0),
        ext_data: encode_atomic_txs(txs, true).unwrap(),
    };
    engine.new_block(body).unwrap()
}

fn credential() -> Vec<Credential> {
    vec![Credential {
        signatures: vec![vec![0u8; 65]],
    }]
}

fn import(config: &Config, utxo_id: UtxoId, amount: u64) -> Tx {
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
                address: USER,
                amount: amount - config.atomic_tx_fee,
                asset_id: config.asset_id,
            }],
        }),
        credential(),
    )
}

fn export(config: &Config, amount: u64, nonce: u64) -> Tx {
    Tx::new(
        UnsignedAtomicTx::Export(UnsignedExportTx {
            network_id: config.network_id,
            blockchain_id: config.chain_id,
            destination_chain: config.platform_chain_id,
            ins: vec![EvmInput {
                address: USER,
                amount,
                asset_id: config.asset_id,
                nonce,
            }],
            exported_outputs: vec![TransferableOutput {
                asset_id: config.asset_id,
                output: TransferOutput {
                    amount: amount - config.atomic_tx_fee,
                    owners: OutputOwners::single(OWNER),
                },
            }],
        }),
        credential(),
    )
}

fn seed(ledger: &SharedLedger, config: &Config, tag: &[u8], amount: u64) -> UtxoId {
    let utxo = Utxo {
        utxo_id: UtxoId::new(Id::hash_of(tag), 0),
        asset_id: config.asset_id,
        output: TransferOutput {
            amount,
            owners: OutputOwners::single(OWNER),
        },
    };
    ledger
        .put(config.platform_chain_id, config.chain_id, utxo.to_element().unwrap())
        .unwrap();
    utxo.utxo_id
}

#[test]
fn test_import_consumes_shared_record_on_accept() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(0, 0);
    let engine = open(config.clone(), &dir, &ledger);
    let x2c = config.x2c_rate as u128;

    let utxo_id = seed(&ledger, &config, b"platform-export", 10_000);
    let tx = import(&config, utxo_id, 10_000);
    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &[tx.clone()]);

    engine.verify(&mut block).unwrap();
    assert_eq!(block.status(), Status::Verified);
    // verified only: nothing consumed yet, nothing credited on the accepted state
    assert!(ledger.contains(config.platform_chain_id, config.chain_id, utxo_id.input_id().as_bytes()));
    assert_eq!(engine.accepted_state().unwrap().get_balance(&USER), 0);

    engine.accept(&mut block).unwrap();
    assert_eq!(block.status(), Status::Accepted);
    assert_eq!(engine.last_accepted(), block.id());
    assert!(!ledger.contains(config.platform_chain_id, config.chain_id, utxo_id.input_id().as_bytes()));
    assert_eq!(
        engine.accepted_state().unwrap().get_balance(&USER),
        9_000 * x2c
    );
    assert_eq!(engine.chain().atomic_tx_height(&tx.id()).unwrap(), Some(1));
    let ops = engine.chain().atomic_ops_at(1).unwrap().unwrap();
    assert_eq!(ops[&config.platform_chain_id].remove_requests.len(), 1);

    // the record is gone, so a second import of it cannot verify
    let mut again = child(&engine, &block, 20, &[import(&config, utxo_id, 10_000)]);
    assert!(engine.verify(&mut again).is_err());
}

#[test]
fn test_child_cannot_reimport_record_of_pending_parent() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(0, 0);
    let engine = open(config.clone(), &dir, &ledger);
    let x2c = config.x2c_rate as u128;

    let utxo_id = seed(&ledger, &config, b"platform-export", 10_000);
    let tx = import(&config, utxo_id, 10_000);
    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut parent = child(&engine, &genesis, 10, &[tx.clone()]);
    engine.verify(&mut parent).unwrap();

    // the record is still in shared memory, but the parent already spends it
    let mut descendant = child(&engine, &parent, 20, &[tx.clone()]);
    assert!(matches!(
        engine.verify(&mut descendant),
        Err(BlockchainError::MissingCrossChainRecord(_))
    ));
    assert!(!engine.atomic_backend().is_staged(&descendant.id()));

    // a sibling on another branch may still carry it
    let mut sibling = child(&engine, &genesis, 11, &[tx]);
    engine.verify(&mut sibling).unwrap();

    engine.accept(&mut parent).unwrap();
    engine.reject(&mut sibling).unwrap();
    assert_eq!(engine.last_accepted(), parent.id());
    assert_eq!(
        engine.accepted_state().unwrap().get_balance(&USER),
        9_000 * x2c
    );
}

#[test]
fn test_accept_with_consumed_record_leaves_chain_untouched() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(0, 0);
    let engine = open(config.clone(), &dir, &ledger);

    let utxo_id = seed(&ledger, &config, b"platform-export", 10_000);
    let tx = import(&config, utxo_id, 10_000);
    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &[tx.clone()]);
    engine.verify(&mut block).unwrap();

    // the record disappears between verify and accept
    let mut consume = BTreeMap::new();
    consume.insert(
        config.platform_chain_id,
        AtomicRequests {
            remove_requests: vec![utxo_id.input_id().to_vec()],
            put_requests: vec![],
        },
    );
    ledger.chain(config.chain_id).apply(&consume).unwrap();

    assert!(matches!(
        engine.accept(&mut block),
        Err(BlockchainError::MissingCrossChainRecord(_))
    ));
    assert_eq!(block.status(), Status::Verified);
    assert_eq!(engine.last_accepted(), genesis.id());
    assert_eq!(engine.chain().atomic_tx_height(&tx.id()).unwrap(), None);
    assert_eq!(engine.accepted_state().unwrap().get_balance(&USER), 0);
    assert!(engine.atomic_backend().is_staged(&block.id()));
}

#[test]
fn test_one_missing_import_fails_the_whole_batch() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(0, 0);
    let engine = open(config.clone(), &dir, &ledger);

    let present = seed(&ledger, &config, b"present", 10_000);
    let missing = UtxoId::new(Id::hash_of(b"never-exported"), 0);
    let txs = [
        import(&config, present, 10_000),
        import(&config, missing, 10_000),
    ];
    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &txs);

    assert!(matches!(
        engine.verify(&mut block),
        Err(BlockchainError::MissingCrossChainRecord(_))
    ));
    assert!(!engine.atomic_backend().is_staged(&block.id()));
    assert!(ledger.contains(
        config.platform_chain_id,
        config.chain_id,
        present.input_id().as_bytes()
    ));

    // the valid import alone still verifies
    let mut alone = child(&engine, &genesis, 10, &txs[..1]);
    engine.verify(&mut alone).unwrap();
}

#[test]
fn test_reject_rolls_back_staged_export() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(10_000, 0);
    let engine = open(config.clone(), &dir, &ledger);

    let tx = export(&config, 5_000, 0);
    let record = UtxoId::new(tx.id(), 0).input_id();
    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &[tx.clone()]);

    engine.verify(&mut block).unwrap();
    assert!(engine.atomic_backend().is_staged(&block.id()));

    engine.reject(&mut block).unwrap();
    assert_eq!(block.status(), Status::Rejected);
    assert!(!engine.atomic_backend().is_staged(&block.id()));
    assert!(!ledger.contains(config.chain_id, config.platform_chain_id, record.as_bytes()));
    assert!(engine.get_block(&block.id()).unwrap().is_none());

    // re-issued as a remote transaction
    assert!(engine.mempool().contains(&tx.id()));
    assert!(!engine.mempool().is_local(&tx.id()));

    // and picked up by the next block
    let mut next = engine.build_block(20).unwrap();
    assert_eq!(next.atomic_txs(), &[tx.clone()]);
    engine.verify(&mut next).unwrap();
    engine.accept(&mut next).unwrap();
    assert!(engine.mempool().is_empty());
    assert!(ledger.contains(config.chain_id, config.platform_chain_id, record.as_bytes()));

    let state = engine.accepted_state().unwrap();
    assert_eq!(state.get_nonce(&USER), 1);
    assert_eq!(state.get_balance(&USER), 5_000 * config.x2c_rate as u128);
}

#[test]
fn test_export_with_wrong_nonce_fails_and_unpins() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(10_000, 0);
    let engine = open(config.clone(), &dir, &ledger);

    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &[export(&config, 5_000, 4)]);
    assert!(engine.verify(&mut block).is_err());
    assert!(!engine.atomic_backend().is_staged(&block.id()));
    assert_eq!(engine.atomic_backend().staged_count(), 0);
}

#[test]
fn test_small_reward_balance_issues_nothing() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let engine = open(config(0, 500_000), &dir, &ledger);

    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut block = child(&engine, &genesis, 10, &[]);
    engine.verify(&mut block).unwrap();
    engine.accept(&mut block).unwrap();
    assert!(engine.mempool().is_empty());
}

#[test]
fn test_reward_cycle() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(0, 1_000_000);
    let engine = open(config.clone(), &dir, &ledger);
    let x2c = config.x2c_rate as u128;

    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut first = child(&engine, &genesis, 10, &[]);
    engine.verify(&mut first).unwrap();
    engine.accept(&mut first).unwrap();

    // the trigger issued a local CollectRewards tx for the whole balance
    let pending = engine.mempool().pending_txs();
    assert_eq!(pending.len(), 1);
    let reward_tx = pending[0].clone();
    assert!(reward_tx.is_collect_rewards());
    assert!(engine.mempool().is_local(&reward_tx.id()));
    let UnsignedAtomicTx::CollectRewards(utx) = &reward_tx.unsigned else {
        panic!("expected a collect rewards tx");
    };
    assert_eq!(utx.export.ins[0].amount, 1_000_000);
    assert_eq!(utx.export.exported_outputs[0].output.amount, 300_000);

    let mut second = engine.build_block(20).unwrap();
    engine.verify(&mut second).unwrap();
    engine.accept(&mut second).unwrap();

    let state = engine.accepted_state().unwrap();
    assert_eq!(state.get_balance(&REWARD_SOURCE_ADDRESS), 400_000 * x2c);
    assert_eq!(state.get_balance(&FEE_REWARD_ADDRESS), 300_000 * x2c);
    assert_eq!(state.get_state(&REWARD_SOURCE_ADDRESS, &BALANCE_SLOT), 400_000 * x2c);
    assert_eq!(state.get_state(&REWARD_SOURCE_ADDRESS, &TIMESTAMP_SLOT), 20 + 3_600);
    assert_eq!(state.get_nonce(&REWARD_SOURCE_ADDRESS), 1);

    // the exported portion is waiting for the platform chain
    let record = UtxoId::new(reward_tx.id(), 0).input_id();
    let values = ledger
        .chain(config.platform_chain_id)
        .get(&config.chain_id, &[record.to_vec()])
        .unwrap();
    assert_eq!(Utxo::from_bytes(&values[0]).unwrap().output.amount, 300_000);

    // everything left is accounted for by the payout marker
    assert!(engine.mempool().is_empty());
    let preview = engine.reward_preview(30).unwrap();
    assert_eq!(preview.distributable, 0);
    assert!(!preview.eligible);
}

#[test]
fn test_accepted_chain_survives_reopen() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let config = config(10_000, 0);

    let accepted = {
        let engine = open(config.clone(), &dir, &ledger);
        let genesis = engine.chain().last_accepted_block().unwrap();
        let mut block = child(&engine, &genesis, 10, &[export(&config, 5_000, 0)]);
        engine.verify(&mut block).unwrap();
        engine.accept(&mut block).unwrap();
        block.id()
    };

    let engine = open(config.clone(), &dir, &ledger);
    assert_eq!(engine.last_accepted(), accepted);
    let block = engine.get_block(&accepted).unwrap().unwrap();
    assert_eq!(block.status(), Status::Accepted);
    assert_eq!(engine.accepted_state().unwrap().get_nonce(&USER), 1);
    assert_eq!(engine.chain().last_accepted(), accepted);
}

#[test]
fn test_sibling_cannot_be_accepted_after_its_twin() {
    let dir = tempdir().unwrap();
    let ledger = SharedLedger::new();
    let engine = open(config(0, 0), &dir, &ledger);

    let genesis = engine.chain().last_accepted_block().unwrap();
    let mut left = child(&engine, &genesis, 10, &[]);
    let mut right = child(&engine, &genesis, 11, &[]);
    engine.verify(&mut left).unwrap();
    engine.verify(&mut right).unwrap();

    engine.accept(&mut left).unwrap();
    assert!(engine.accept(&mut right).is_err());
    engine.reject(&mut right).unwrap();
    assert_eq!(engine.last_accepted(), left.id());
}
