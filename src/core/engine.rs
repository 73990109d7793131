//! The engine owns every collaborator and lends them to blocks through a
//! [`ChainContext`] for each lifecycle call.

use crate::config::Config;
use crate::core::atomic::{encode_atomic_txs, Tx};
use crate::core::rewards::{reward_preview, RewardPreview};
use crate::core::{
    Block, BlockBody, BlockValidator, Blockchain, BonusBlocks, ChainContext, DeferredChecks, Id,
    LocalChain, PostAcceptHook, RuleResolver, SyntacticBlockValidator,
};
use crate::error::Result;
use crate::storage::{AtomicBackend, Mempool, MemoryPool, SharedMemory, StateDb};
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Engine {
    config: Config,
    resolver: RuleResolver,
    validator: Box<dyn SyntacticBlockValidator>,
    chain: Blockchain,
    atomic: AtomicBackend,
    mempool: MemoryPool,
    deferred: DeferredChecks,
    hooks: Vec<Box<dyn PostAcceptHook>>,
    bootstrapped: AtomicBool,
}

impl Engine {
    /// Opens the chain under `config.data_dir` with the network's bonus table
    pub fn open(config: Config, shared_memory: Arc<dyn SharedMemory>) -> Result<Engine> {
        let path = config.data_dir.clone();
        let bonus_blocks = BonusBlocks::for_network(config.network)?;
        Self::open_with(config, &path, shared_memory, bonus_blocks)
    }

    pub fn open_with(
        config: Config,
        path: &Path,
        shared_memory: Arc<dyn SharedMemory>,
        bonus_blocks: BonusBlocks,
    ) -> Result<Engine> {
        config.validate()?;
        let chain = Blockchain::open_with_path(&config, path)?;
        info!(
            "Opened {} chain {} at last accepted block {}",
            config.network,
            config.chain_id,
            chain.last_accepted()
        );
        Ok(Engine {
            resolver: RuleResolver::new(config.forks.clone()),
            validator: Box::new(BlockValidator::new(config.clone())),
            mempool: MemoryPool::new(config.mempool.max_size),
            atomic: AtomicBackend::new(bonus_blocks, shared_memory),
            deferred: DeferredChecks::new(),
            hooks: Vec::new(),
            bootstrapped: AtomicBool::new(false),
            chain,
            config,
        })
    }

    pub fn context(&self) -> ChainContext<'_> {
        ChainContext {
            config: &self.config,
            resolver: &self.resolver,
            validator: self.validator.as_ref(),
            chain: &self.chain,
            atomic: &self.atomic,
            mempool: &self.mempool,
            deferred: &self.deferred,
            hooks: &self.hooks,
            bootstrapped: self.is_bootstrapped(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn atomic_backend(&self) -> &AtomicBackend {
        &self.atomic
    }

    pub fn set_validator(&mut self, validator: Box<dyn SyntacticBlockValidator>) {
        self.validator = validator;
    }

    pub fn add_post_accept_hook(&mut self, hook: Box<dyn PostAcceptHook>) {
        self.hooks.push(hook);
    }

    pub fn set_bootstrapped(&self, bootstrapped: bool) {
        self.bootstrapped.store(bootstrapped, Ordering::SeqCst);
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::SeqCst)
    }

    pub fn parse_block(&self, bytes: &[u8]) -> Result<Block> {
        Block::from_bytes(bytes, &self.resolver)
    }

    pub fn new_block(&self, body: BlockBody) -> Result<Block> {
        Block::new(body, &self.resolver)
    }

    /// Block on top of the last accepted one carrying every pending
    /// transaction the rules at `timestamp` allow.
    pub fn build_block(&self, timestamp: u64) -> Result<Block> {
        let parent = self.chain.last_accepted_block()?;
        let height = parent.height() + 1;
        let rules = self.resolver.rules(height, timestamp);

        let mut txs = self.mempool.pending_txs();
        if !rules.is_batch_atomic_txs {
            txs.truncate(1);
        }
        let body = BlockBody {
            parent_id: parent.id(),
            height,
            timestamp,
            base_fee: rules.is_fee_market.then_some(0),
            ext_data: encode_atomic_txs(&txs, rules.is_batch_atomic_txs)?,
        };
        self.new_block(body)
    }

    pub fn verify(&self, block: &mut Block) -> Result<()> {
        block.verify(&self.context())
    }

    pub fn accept(&self, block: &mut Block) -> Result<()> {
        block.accept(&self.context())
    }

    pub fn reject(&self, block: &mut Block) -> Result<()> {
        block.reject(&self.context())
    }

    pub fn issue_tx(&self, tx: Tx, local: bool) -> Result<()> {
        self.context().issue_tx(tx, local)
    }

    pub fn last_accepted(&self) -> Id {
        self.chain.last_accepted()
    }

    pub fn get_block(&self, id: &Id) -> Result<Option<Block>> {
        self.chain.get_block(id)
    }

    pub fn accepted_state(&self) -> Result<StateDb> {
        self.chain.last_accepted_state()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.count()
    }

    /// Reward trigger view of the accepted state at `timestamp`
    pub fn reward_preview(&self, timestamp: u64) -> Result<RewardPreview> {
        Ok(reward_preview(&self.config, &self.accepted_state()?, timestamp))
    }
}
