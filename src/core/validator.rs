use crate::config::Config;
use crate::core::{Block, Rules};
use crate::error::{BlockchainError, Result};
use std::collections::HashSet;

/// Structural, fee and syntax rules of a block body under a rule-set
pub trait SyntacticBlockValidator: Send + Sync {
    fn syntactic_verify(&self, block: &Block, rules: &Rules) -> Result<()>;
}

pub struct BlockValidator {
    config: Config,
}

impl BlockValidator {
    pub fn new(config: Config) -> BlockValidator {
        BlockValidator { config }
    }
}

fn invalid(msg: String) -> BlockchainError {
    BlockchainError::SyntacticVerification(msg)
}

impl SyntacticBlockValidator for BlockValidator {
    fn syntactic_verify(&self, block: &Block, rules: &Rules) -> Result<()> {
        let body = block.body();

        match (rules.is_fee_market, body.base_fee) {
            (true, None) => {
                return Err(invalid(format!(
                    "block {} is missing a base fee",
                    block.id()
                )))
            }
            (false, Some(fee)) => {
                return Err(invalid(format!(
                    "block {} carries base fee {fee} before fee market rules",
                    block.id()
                )))
            }
            _ => {}
        }

        if body.ext_data.len() > self.config.max_ext_data_size {
            return Err(invalid(format!(
                "ext data of {} bytes exceeds {}",
                body.ext_data.len(),
                self.config.max_ext_data_size
            )));
        }

        let txs = block.atomic_txs();
        if !rules.is_batch_atomic_txs && txs.len() > 1 {
            return Err(invalid(format!(
                "{} atomic transactions before batch rules",
                txs.len()
            )));
        }

        let mut spent = HashSet::new();
        for tx in txs {
            tx.verify(&self.config, rules)
                .map_err(|e| invalid(format!("atomic tx {}: {e}", tx.id())))?;
            for input in tx.input_ids() {
                if !spent.insert(input) {
                    return Err(invalid(format!(
                        "input {input} spent twice in block {}",
                        block.id()
                    )));
                }
            }
        }
        Ok(())
    }
}
