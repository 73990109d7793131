//! Children whose syntax could not be judged because their parent was not
//! known yet. Keyed by the parent id; the parent resolves its child against
//! its own rules when it is verified.

use crate::core::{Block, Id, Rules, SyntacticBlockValidator};
use crate::error::{BlockchainError, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct DeferredChecks {
    pending: RwLock<HashMap<Id, Block>>,
}

impl DeferredChecks {
    pub fn new() -> DeferredChecks {
        DeferredChecks::default()
    }

    pub fn count(&self) -> usize {
        match self.pending.read() {
            Ok(pending) => pending.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on deferred checks");
                0
            }
        }
    }

    pub fn contains(&self, parent_id: &Id) -> bool {
        match self.pending.read() {
            Ok(pending) => pending.contains_key(parent_id),
            Err(_) => {
                log::error!("Failed to acquire read lock on deferred checks");
                false
            }
        }
    }

    /// Replaces any child already waiting on `parent_id`
    pub fn push(&self, parent_id: Id, child: Block) -> Result<()> {
        let mut pending = self.pending.write().map_err(|_| poisoned())?;
        debug!("deferring syntax check of {} until {parent_id} arrives", child.id());
        pending.insert(parent_id, child);
        Ok(())
    }

    /// Judges the child waiting on `block` (if any) by `rules`. The entry is
    /// gone afterwards whatever the outcome.
    pub fn resolve(
        &self,
        block: &Block,
        rules: &Rules,
        validator: &dyn SyntacticBlockValidator,
    ) -> Result<()> {
        let child = {
            let mut pending = self.pending.write().map_err(|_| poisoned())?;
            pending.remove(&block.id())
        };
        match child {
            Some(child) => {
                debug!("resolving deferred check of {} against {}", child.id(), block.id());
                validator.syntactic_verify(&child, rules)
            }
            None => Ok(()),
        }
    }
}

fn poisoned() -> BlockchainError {
    BlockchainError::Database("deferred checks lock poisoned".to_string())
}
