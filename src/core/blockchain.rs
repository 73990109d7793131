// The local ledger: every verified block with the account state it produces,
// plus the canonical (accepted) chain persisted in sled.
// Blocks live in the `blocks` tree; the `accepted` tree holds the
// last-accepted pointer, the accepted state, the height index and the atomic
// repository, all written through one batch per accepted block.

use crate::config::Config;
use crate::core::atomic::{ExecutionEnv, AtomicRequests};
use crate::core::{Block, BlockBody, ChainContext, Id, RuleResolver, Status};
use crate::error::{BlockchainError, Result};
use crate::storage::atomic_backend::{decode_height_ops, height_ops_key, tx_height_key};
use crate::storage::StateDb;
use crate::utils::{deserialize, serialize};
use log::{debug, info};
use sled::{Batch, Db, Tree};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const LAST_ACCEPTED_KEY: &[u8] = b"last_accepted";
const ACCEPTED_STATE_KEY: &[u8] = b"accepted_state";
const HEIGHT_PREFIX: &[u8] = b"height/";
const BLOCKS_TREE: &str = "blocks";
const ACCEPTED_TREE: &str = "accepted";

fn height_key(height: u64) -> Vec<u8> {
    [HEIGHT_PREFIX, &height.to_be_bytes()[..]].concat()
}

/// Ledger access the block lifecycle needs from the execution layer
pub trait LocalChain: Send + Sync {
    /// A block known locally: accepted, or verified and still pending
    fn get_block(&self, id: &Id) -> Result<Option<Block>>;

    fn last_accepted(&self) -> Id;

    /// State after `block_id`, while that block is pending or last accepted
    fn state_at(&self, block_id: &Id) -> Result<Option<StateDb>>;

    /// Executes the block on its parent's state and pins its atomic effects
    fn insert_block(&self, block: &Block, ctx: &ChainContext<'_>) -> Result<()>;

    /// Adds the canonical-chain writes of `block` to `batch`
    fn stage_accept(&self, block: &Block, batch: &mut Batch) -> Result<()>;

    /// Writes `batch` atomically and makes `block_id` the last accepted block
    fn commit(&self, block_id: &Id, batch: Batch) -> Result<()>;

    fn reject(&self, block: &Block) -> Result<()>;
}

#[derive(Clone)]
pub struct Blockchain {
    db: Db,
    blocks: Tree,
    accepted: Tree,
    last_accepted: Arc<RwLock<Id>>,
    // I keep one state per pending block plus the last accepted one
    states: Arc<RwLock<HashMap<Id, StateDb>>>,
    db_path: PathBuf,
}

impl Blockchain {
    pub fn open(config: &Config) -> Result<Blockchain> {
        Self::open_with_path(config, &config.data_dir)
    }

    // Opens the database at `path`, writing the genesis block on first use
    pub fn open_with_path(config: &Config, path: &Path) -> Result<Blockchain> {
        let db = sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;
        let accepted = db.open_tree(ACCEPTED_TREE).map_err(|e| {
            BlockchainError::Database(format!("Failed to open accepted tree: {e}"))
        })?;

        let (last_accepted, state) = match accepted.get(LAST_ACCEPTED_KEY)? {
            Some(bytes) => {
                let id = Id::from_slice(&bytes)?;
                let state_bytes = accepted.get(ACCEPTED_STATE_KEY)?.ok_or_else(|| {
                    BlockchainError::Database("accepted state is missing".to_string())
                })?;
                debug!("reopened chain at last accepted block {id}");
                (id, deserialize::<StateDb>(&state_bytes)?)
            }
            None => Self::write_genesis(config, &blocks, &accepted)?,
        };

        let mut states = HashMap::new();
        states.insert(last_accepted, state);
        Ok(Blockchain {
            db,
            blocks,
            accepted,
            last_accepted: Arc::new(RwLock::new(last_accepted)),
            states: Arc::new(RwLock::new(states)),
            db_path: path.to_path_buf(),
        })
    }

    fn write_genesis(config: &Config, blocks: &Tree, accepted: &Tree) -> Result<(Id, StateDb)> {
        let resolver = RuleResolver::new(config.forks.clone());
        let timestamp = config.genesis.timestamp;
        let body = BlockBody {
            parent_id: Id::EMPTY,
            height: 0,
            timestamp,
            base_fee: resolver.rules(0, timestamp).is_fee_market.then_some(0),
            ext_data: vec![],
        };
        let mut genesis = Block::new(body, &resolver)?;
        genesis.set_status(Status::Accepted);

        let mut state = StateDb::new();
        for account in &config.genesis.alloc {
            state.add_balance(
                &account.address,
                account.balance as u128 * config.x2c_rate as u128,
            )?;
        }

        let id = genesis.id();
        blocks.insert(id.as_bytes(), serialize(&genesis)?)?;
        let mut batch = Batch::default();
        batch.insert(LAST_ACCEPTED_KEY, id.to_vec());
        batch.insert(ACCEPTED_STATE_KEY, serialize(&state)?);
        batch.insert(height_key(0), id.to_vec());
        accepted.apply_batch(batch)?;
        info!(
            "Created genesis block {id} with {} funded accounts",
            config.genesis.alloc.len()
        );
        Ok((id, state))
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn accepted_id_at(&self, height: u64) -> Result<Option<Id>> {
        self.accepted
            .get(height_key(height))?
            .map(|bytes| Id::from_slice(&bytes))
            .transpose()
    }

    pub fn last_accepted_block(&self) -> Result<Block> {
        let id = self.last_accepted();
        self.get_block(&id)?.ok_or_else(|| {
            BlockchainError::EngineInvariantViolation(format!(
                "last accepted block {id} is missing"
            ))
        })
    }

    pub fn last_accepted_state(&self) -> Result<StateDb> {
        let id = self.last_accepted();
        self.state_at(&id)?.ok_or_else(|| {
            BlockchainError::EngineInvariantViolation(format!(
                "state of last accepted block {id} is missing"
            ))
        })
    }

    /// Height at which an atomic transaction was accepted
    pub fn atomic_tx_height(&self, tx_id: &Id) -> Result<Option<u64>> {
        match self.accepted.get(tx_height_key(tx_id))? {
            Some(bytes) => {
                let array: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    BlockchainError::Database(format!("bad height index for tx {tx_id}"))
                })?;
                Ok(Some(u64::from_be_bytes(array)))
            }
            None => Ok(None),
        }
    }

    /// Merged shared-memory requests accepted at `height`
    pub fn atomic_ops_at(&self, height: u64) -> Result<Option<BTreeMap<Id, AtomicRequests>>> {
        self.accepted
            .get(height_ops_key(height))?
            .map(|bytes| decode_height_ops(&bytes))
            .transpose()
    }

    pub fn pending_count(&self) -> usize {
        match self.states.read() {
            Ok(states) => states.len().saturating_sub(1),
            Err(_) => {
                log::error!("Failed to acquire read lock on block states");
                0
            }
        }
    }

    fn is_accepted(&self, block: &Block) -> Result<bool> {
        Ok(self.accepted_id_at(block.height())? == Some(block.id()))
    }

    // Records imported by a verified but unaccepted ancestor are still in
    // shared memory, so the presence check alone would let a descendant
    // spend them a second time. We walk back to the last accepted block and
    // refuse any input one of those ancestors already spends.
    fn check_pending_ancestors(&self, block: &Block) -> Result<()> {
        let inputs: HashSet<Id> = block
            .atomic_txs()
            .iter()
            .flat_map(|tx| tx.input_ids())
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }

        let last_accepted = self.last_accepted_block()?;
        let mut ancestor_id = block.parent_id();
        while ancestor_id != last_accepted.id() {
            let ancestor = self.get_block(&ancestor_id)?.ok_or_else(|| {
                BlockchainError::UnknownAncestor(format!(
                    "ancestor {ancestor_id} of block {} is unknown",
                    block.id()
                ))
            })?;
            if ancestor.height() <= last_accepted.height() {
                break;
            }
            for tx in ancestor.atomic_txs() {
                if let Some(input) = tx.input_ids().into_iter().find(|id| inputs.contains(id)) {
                    return Err(BlockchainError::MissingCrossChainRecord(format!(
                        "input {input} of block {} is already spent by pending ancestor {ancestor_id}",
                        block.id()
                    )));
                }
            }
            ancestor_id = ancestor.parent_id();
        }
        Ok(())
    }
}

fn poisoned() -> BlockchainError {
    BlockchainError::Database("block state lock poisoned".to_string())
}

impl LocalChain for Blockchain {
    fn get_block(&self, id: &Id) -> Result<Option<Block>> {
        let Some(bytes) = self.blocks.get(id.as_bytes())? else {
            return Ok(None);
        };
        let mut block: Block = deserialize(&bytes)?;
        let status = if self.is_accepted(&block)? {
            Status::Accepted
        } else {
            Status::Verified
        };
        block.set_status(status);
        Ok(Some(block))
    }

    fn last_accepted(&self) -> Id {
        match self.last_accepted.read() {
            Ok(id) => *id,
            Err(_) => {
                log::error!("Failed to acquire read lock on last accepted id");
                Id::EMPTY
            }
        }
    }

    fn state_at(&self, block_id: &Id) -> Result<Option<StateDb>> {
        let states = self.states.read().map_err(|_| poisoned())?;
        Ok(states.get(block_id).cloned())
    }

    fn insert_block(&self, block: &Block, ctx: &ChainContext<'_>) -> Result<()> {
        let parent = self.get_block(&block.parent_id())?.ok_or_else(|| {
            BlockchainError::UnknownAncestor(format!(
                "parent {} of block {} is unknown",
                block.parent_id(),
                block.id()
            ))
        })?;
        if block.height() != parent.height() + 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} at height {} does not follow parent height {}",
                block.id(),
                block.height(),
                parent.height()
            )));
        }
        if block.timestamp() < parent.timestamp() {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} is older than its parent",
                block.id()
            )));
        }
        self.check_pending_ancestors(block)?;
        let mut state = self.state_at(&parent.id())?.ok_or_else(|| {
            BlockchainError::UnknownAncestor(format!(
                "state of parent {} is no longer available",
                parent.id()
            ))
        })?;

        let env = ExecutionEnv {
            config: ctx.config,
            rules: ctx.resolver.rules_for(block.body()),
            shared_memory: ctx.atomic.shared_memory(),
            block: block.body(),
            // bonus blocks consumed their UTXOs at another height
            bootstrapped: ctx.bootstrapped && !ctx.atomic.is_bonus(block.height(), &block.id()),
        };
        let mut txs = block.atomic_txs().to_vec();
        for tx in &mut txs {
            tx.semantic_verify(&env, &state)?;
            tx.state_transfer(&env, &mut state)?;
        }

        ctx.atomic.insert_txs(block.id(), block.height(), &txs)?;

        let mut stored = block.clone();
        stored.set_status(Status::Verified);
        self.blocks.insert(block.id().as_bytes(), serialize(&stored)?)?;
        self.states
            .write()
            .map_err(|_| poisoned())?
            .insert(block.id(), state);
        Ok(())
    }

    fn stage_accept(&self, block: &Block, batch: &mut Batch) -> Result<()> {
        let last_accepted = self.last_accepted();
        if block.parent_id() != last_accepted {
            return Err(BlockchainError::InvalidBlock(format!(
                "block {} does not extend last accepted block {last_accepted}",
                block.id()
            )));
        }
        let state = self.state_at(&block.id())?.ok_or_else(|| {
            BlockchainError::EngineInvariantViolation(format!(
                "no state for verified block {}",
                block.id()
            ))
        })?;
        batch.insert(ACCEPTED_STATE_KEY, serialize(&state)?);
        batch.insert(height_key(block.height()), block.id().to_vec());
        Ok(())
    }

    fn commit(&self, block_id: &Id, batch: Batch) -> Result<()> {
        self.accepted.apply_batch(batch)?;
        self.accepted.flush()?;

        let previous = {
            let mut last_accepted = self.last_accepted.write().map_err(|_| poisoned())?;
            std::mem::replace(&mut *last_accepted, *block_id)
        };
        self.states.write().map_err(|_| poisoned())?.remove(&previous);
        debug!("last accepted block is now {block_id}");
        Ok(())
    }

    fn reject(&self, block: &Block) -> Result<()> {
        self.states
            .write()
            .map_err(|_| poisoned())?
            .remove(&block.id());
        self.blocks.remove(block.id().as_bytes())?;
        Ok(())
    }
}
