use crate::core::atomic::{extract_atomic_txs, Tx};
use crate::core::{ChainContext, Id, RuleResolver, LAST_ACCEPTED_KEY};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sled::Batch;

/// What consensus orders; the id is the hash of its encoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BlockBody {
    pub parent_id: Id,
    pub height: u64,
    pub timestamp: u64,
    pub base_fee: Option<u64>,
    /// Encoded atomic transactions
    pub ext_data: Vec<u8>,
}

impl BlockBody {
    pub fn bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BlockBody> {
        deserialize(bytes)
    }

    pub fn id(&self) -> Result<Id> {
        Ok(Id::hash_of(&self.bytes()?))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unverified,
    Verified,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    id: Id,
    body: BlockBody,
    atomic_txs: Vec<Tx>,
    status: Status,
}

impl Block {
    /// Wraps `body`, decoding its atomic transactions in the format its own
    /// timestamp selects.
    pub fn new(body: BlockBody, resolver: &RuleResolver) -> Result<Block> {
        let batch = resolver.rules_for(&body).is_batch_atomic_txs;
        let atomic_txs = extract_atomic_txs(&body.ext_data, batch)?;
        Ok(Block {
            id: body.id()?,
            body,
            atomic_txs,
            status: Status::Unverified,
        })
    }

    pub fn from_bytes(bytes: &[u8], resolver: &RuleResolver) -> Result<Block> {
        Block::new(BlockBody::from_bytes(bytes)?, resolver)
    }

    /// Canonical encoding of the body
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.body.bytes()
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn parent_id(&self) -> Id {
        self.body.parent_id
    }

    pub fn height(&self) -> u64 {
        self.body.height
    }

    pub fn timestamp(&self) -> u64 {
        self.body.timestamp
    }

    pub fn body(&self) -> &BlockBody {
        &self.body
    }

    pub fn atomic_txs(&self) -> &[Tx] {
        self.atomic_txs.as_slice()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Lets the host replay a status decided earlier
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Runs the validator against this block's own rules. When that fails
    /// the parent's rules decide instead; if the parent is unknown the check
    /// is deferred to the parent's own verification and passes for now.
    pub fn syntactic_verify(&self, ctx: &ChainContext<'_>) -> Result<()> {
        let rules = ctx.resolver.rules_for(&self.body);

        ctx.deferred.resolve(self, &rules, ctx.validator)?;

        let mut result = ctx.validator.syntactic_verify(self, &rules);
        if result.is_err() && self.height() > 0 {
            match ctx.chain.get_block(&self.parent_id()) {
                Ok(Some(parent)) => {
                    let parent_rules = ctx.resolver.rules_for(parent.body());
                    result = ctx.validator.syntactic_verify(self, &parent_rules);
                }
                Ok(None) => {
                    ctx.deferred.push(self.parent_id(), self.clone())?;
                    result = Ok(());
                }
                Err(e) => {
                    warn!("parent lookup for {} failed, deferring: {e}", self.id);
                    ctx.deferred.push(self.parent_id(), self.clone())?;
                    result = Ok(());
                }
            }
        }

        result.map_err(|e| match e {
            BlockchainError::SyntacticVerification(_) => e,
            other => BlockchainError::SyntacticVerification(other.to_string()),
        })
    }

    pub fn verify(&mut self, ctx: &ChainContext<'_>) -> Result<()> {
        debug!("verifying block {} at height {}", self.id, self.height());
        match self.verify_and_insert(ctx) {
            Ok(()) => {
                self.status = Status::Verified;
                Ok(())
            }
            Err(e) => {
                if ctx.atomic.is_staged(&self.id) {
                    if let Err(rollback) =
                        ctx.atomic.staged_state(&self.id).and_then(|s| s.reject())
                    {
                        warn!("failed to unpin atomic state of {}: {rollback}", self.id);
                    }
                }
                Err(e)
            }
        }
    }

    fn verify_and_insert(&self, ctx: &ChainContext<'_>) -> Result<()> {
        self.syntactic_verify(ctx)?;
        self.verify_utxos_present(ctx)?;
        ctx.chain.insert_block(self, ctx)
    }

    /// Every UTXO an import consumes must be in shared memory
    fn verify_utxos_present(&self, ctx: &ChainContext<'_>) -> Result<()> {
        if ctx.atomic.is_bonus(self.height(), &self.id) {
            info!("skipping atomic tx verification on bonus block {}", self.id);
            return Ok(());
        }
        if !ctx.bootstrapped {
            return Ok(());
        }

        for tx in &self.atomic_txs {
            let (chain_id, requests) = tx.atomic_ops()?;
            ctx.atomic
                .shared_memory()
                .get(&chain_id, &requests.remove_requests)
                .map_err(|e| match e {
                    BlockchainError::MissingCrossChainRecord(_) => e,
                    other => BlockchainError::MissingCrossChainRecord(other.to_string()),
                })?;
        }
        Ok(())
    }

    pub fn accept(&mut self, ctx: &ChainContext<'_>) -> Result<()> {
        if self.status != Status::Verified {
            return Err(BlockchainError::InvalidBlock(format!(
                "cannot accept block {} in status {:?}",
                self.id, self.status
            )));
        }
        debug!("accepting block {} at height {}", self.id, self.height());

        let mut batch = Batch::default();
        ctx.chain.stage_accept(self, &mut batch)?;
        batch.insert(LAST_ACCEPTED_KEY, self.id.to_vec());

        for tx in &self.atomic_txs {
            ctx.mempool.remove_tx(&tx.id());
        }

        ctx.atomic
            .staged_state(&self.id)?
            .accept(batch, ctx.chain)?;
        self.status = Status::Accepted;

        crate::core::rewards::trigger_rewards(ctx, self);
        for hook in ctx.hooks {
            hook.on_accept(self, ctx)?;
        }
        Ok(())
    }

    /// Re-issues the block's transactions and drops everything it staged
    pub fn reject(&mut self, ctx: &ChainContext<'_>) -> Result<()> {
        debug!("rejecting block {} at height {}", self.id, self.height());
        for tx in &self.atomic_txs {
            ctx.mempool.remove_tx(&tx.id());
            if let Err(e) = ctx.issue_tx(tx.clone(), false) {
                debug!("failed to re-issue tx {} of rejected block: {e}", tx.id());
            }
        }

        ctx.atomic.staged_state(&self.id)?.reject()?;
        ctx.chain.reject(self)?;
        self.status = Status::Rejected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForkSchedule;
    use crate::core::atomic::{encode_atomic_txs, UnsignedCollectRewardsTx};
    use crate::config::Config;

    #[test]
    fn test_id_is_hash_of_encoding() {
        let body = BlockBody {
            parent_id: Id::hash_of(b"parent"),
            height: 4,
            timestamp: 40,
            base_fee: Some(1),
            ext_data: vec![],
        };
        let block = Block::new(body.clone(), &RuleResolver::default()).unwrap();
        assert_eq!(block.id(), Id::hash_of(&body.bytes().unwrap()));
        assert_eq!(block.status(), Status::Unverified);

        let parsed = Block::from_bytes(&block.bytes().unwrap(), &RuleResolver::default()).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn test_ext_data_format_follows_block_time() {
        let config = Config::default();
        let tx = UnsignedCollectRewardsTx::build(&config, 1_000_000, 0);
        let resolver = RuleResolver::new(ForkSchedule {
            batch_atomic_txs_time: Some(100),
            ..ForkSchedule::default()
        });

        let before = BlockBody {
            timestamp: 99,
            ext_data: encode_atomic_txs(std::slice::from_ref(&tx), false).unwrap(),
            ..BlockBody::default()
        };
        assert_eq!(Block::new(before, &resolver).unwrap().atomic_txs(), &[tx.clone()]);

        let after = BlockBody {
            timestamp: 100,
            ext_data: encode_atomic_txs(std::slice::from_ref(&tx), true).unwrap(),
            ..BlockBody::default()
        };
        assert_eq!(Block::new(after, &resolver).unwrap().atomic_txs(), &[tx]);
    }
}
