//! Collaborators a block borrows from its engine for one lifecycle call.

use crate::config::Config;
use crate::core::atomic::Tx;
use crate::core::{Block, DeferredChecks, LocalChain, RuleResolver, Rules, SyntacticBlockValidator};
use crate::error::{BlockchainError, Result};
use crate::storage::{AtomicBackend, Mempool};
use crate::utils::current_timestamp;

/// Extra work run after every accepted block. A failure fails the accept.
pub trait PostAcceptHook: Send + Sync {
    fn on_accept(&self, block: &Block, ctx: &ChainContext<'_>) -> Result<()>;
}

pub struct ChainContext<'a> {
    pub config: &'a Config,
    pub resolver: &'a RuleResolver,
    pub validator: &'a dyn SyntacticBlockValidator,
    pub chain: &'a dyn LocalChain,
    pub atomic: &'a AtomicBackend,
    pub mempool: &'a dyn Mempool,
    pub deferred: &'a DeferredChecks,
    pub hooks: &'a [Box<dyn PostAcceptHook>],
    pub bootstrapped: bool,
}

impl ChainContext<'_> {
    /// Rules a block built on the last accepted block would run under now
    pub fn current_rules(&self) -> Result<Rules> {
        let last = self
            .chain
            .get_block(&self.chain.last_accepted())?
            .ok_or_else(|| {
                BlockchainError::EngineInvariantViolation(
                    "last accepted block is missing".to_string(),
                )
            })?;
        let timestamp = current_timestamp()?.max(last.timestamp());
        Ok(self.resolver.rules(last.height() + 1, timestamp))
    }

    /// Syntactic checks under the current rules, then into the mempool
    pub fn issue_tx(&self, tx: Tx, local: bool) -> Result<()> {
        tx.verify(self.config, &self.current_rules()?)?;
        self.mempool.issue_tx(tx, local)
    }
}
