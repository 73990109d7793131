//! Reward trigger: after each accepted block, decide whether the fees
//! collected at the reward source are worth distributing and, if so, issue a
//! CollectRewards transaction.

use crate::config::Config;
use crate::core::atomic::{
    Tx, UnsignedCollectRewardsTx, BALANCE_SLOT, REWARD_SOURCE_ADDRESS, TIMESTAMP_SLOT,
};
use crate::core::monetary::to_native_subunits;
use crate::core::{Block, ChainContext};
use crate::error::{BlockchainError, Result};
use crate::storage::StateDb;
use log::{debug, info, warn};
use serde::Serialize;

/// Source balance not yet paid out, in native subunits
pub fn distributable_amount(config: &Config, state: &StateDb) -> u64 {
    let balance = state.get_balance(&REWARD_SOURCE_ADDRESS);
    let paid_out = state.get_state(&REWARD_SOURCE_ADDRESS, &BALANCE_SLOT);
    to_native_subunits(balance.saturating_sub(paid_out), config.x2c_rate)
}

/// Amount to distribute at `timestamp`, or the benign reason not to
pub fn check_eligibility(config: &Config, state: &StateDb, timestamp: u64) -> Result<u64> {
    let trigger_time = state.get_state(&REWARD_SOURCE_ADDRESS, &TIMESTAMP_SLOT);
    let block_time = timestamp % config.rewards.interval;
    if (block_time as u128) < trigger_time {
        return Err(BlockchainError::TimeNotYetElapsed {
            block_time,
            trigger_time,
        });
    }

    let amount = distributable_amount(config, state);
    let export = config.rewards.export_amount(amount);
    if export < config.rewards.min_export_amount {
        return Err(BlockchainError::ExportLimitNotReached {
            amount: export,
            minimum: config.rewards.min_export_amount,
        });
    }
    Ok(amount)
}

/// The transaction the trigger would issue on top of `state`
pub fn build_reward_tx(config: &Config, state: &StateDb, timestamp: u64) -> Result<Tx> {
    let amount = check_eligibility(config, state, timestamp)?;
    let nonce = state.get_nonce(&REWARD_SOURCE_ADDRESS);
    Ok(UnsignedCollectRewardsTx::build(config, amount, nonce))
}

/// Runs after every accepted block; never fails the accept
pub fn trigger_rewards(ctx: &ChainContext<'_>, block: &Block) {
    if !ctx.resolver.rules_for(block.body()).is_collect_rewards {
        return;
    }
    let state = match ctx.chain.state_at(&block.id()) {
        Ok(Some(state)) => state,
        Ok(None) => {
            warn!("TriggerRewards: no state for accepted block {}", block.id());
            return;
        }
        Err(e) => {
            warn!("TriggerRewards: unable to get state: {e}");
            return;
        }
    };

    let tx = match build_reward_tx(ctx.config, &state, block.timestamp()) {
        Ok(tx) => tx,
        Err(e) if e.is_benign() => {
            debug!("no rewards after block {}: {e}", block.id());
            return;
        }
        Err(e) => {
            warn!("TriggerRewards: {e}");
            return;
        }
    };

    let tx_id = tx.id();
    match ctx.issue_tx(tx, true) {
        Ok(()) => info!(
            "Issued CollectRewardsTx {tx_id} distributing {}",
            distributable_amount(ctx.config, &state)
        ),
        Err(e) => debug!("CollectRewardsTx {tx_id} not issued: {e}"),
    }
}

/// What the trigger sees for a given state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardPreview {
    pub source_balance: u128,
    pub last_payout_balance: u128,
    pub next_trigger_time: u128,
    pub distributable: u64,
    pub export_amount: u64,
    pub incentive_amount: u64,
    pub min_export_amount: u64,
    pub eligible: bool,
    pub reason: Option<String>,
}

pub fn reward_preview(config: &Config, state: &StateDb, timestamp: u64) -> RewardPreview {
    let distributable = distributable_amount(config, state);
    let eligibility = check_eligibility(config, state, timestamp);
    RewardPreview {
        source_balance: state.get_balance(&REWARD_SOURCE_ADDRESS),
        last_payout_balance: state.get_state(&REWARD_SOURCE_ADDRESS, &BALANCE_SLOT),
        next_trigger_time: state.get_state(&REWARD_SOURCE_ADDRESS, &TIMESTAMP_SLOT),
        distributable,
        export_amount: config.rewards.export_amount(distributable),
        incentive_amount: config.rewards.incentive_amount(distributable),
        min_export_amount: config.rewards.min_export_amount,
        eligible: eligibility.is_ok(),
        reason: eligibility.err().map(|e| e.to_string()),
    }
}
