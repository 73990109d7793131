//! CollectRewards: a protocol-issued export of accumulated fees.
//!
//! The source account collects burned fees. Once per interval part of its
//! balance is exported to the platform chain and another part is credited to
//! the incentive pool; what remains is tracked as burned in the payout marker.

use crate::config::Config;
use crate::core::atomic::{
    AtomicRequests, EvmInput, ExecutionEnv, OutputOwners, TransferOutput, TransferableOutput,
    Tx, UnsignedAtomicTx, UnsignedExportTx,
};
use crate::core::{Address, Id, Rules, ShortId};
use crate::error::{BlockchainError, Result};
use crate::storage::{StateDb, StorageSlot};
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use serde::{Deserialize, Serialize};

const fn tagged_address(first: u8, last: u8) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    bytes[0] = first;
    bytes[19] = last;
    bytes
}

const fn slot(first: u8) -> StorageSlot {
    let mut bytes = [0u8; 32];
    bytes[0] = first;
    bytes
}

/// Account that accumulates burned fees
pub const REWARD_SOURCE_ADDRESS: Address = Address::new(tagged_address(0x01, 0x00));
/// Incentive pool; also the sole owner of every exported reward
pub const FEE_REWARD_ADDRESS: Address = Address::new(tagged_address(0x01, 0x0c));
pub const FEE_REWARD_SHORT_ID: ShortId = ShortId::new(tagged_address(0x01, 0x0c));

/// Running total of balance already paid out or burned
pub const BALANCE_SLOT: StorageSlot = slot(0x01);
/// Next trigger marker
pub const TIMESTAMP_SLOT: StorageSlot = slot(0x02);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedCollectRewardsTx {
    pub export: UnsignedExportTx,
    /// `block timestamp % interval`, captured during semantic verification.
    /// Not part of the encoding.
    #[serde(skip)]
    block_time: Option<u64>,
}

impl PartialEq for UnsignedCollectRewardsTx {
    fn eq(&self, other: &Self) -> bool {
        self.export == other.export
    }
}

impl Eq for UnsignedCollectRewardsTx {}

impl Encode for UnsignedCollectRewardsTx {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        self.export.encode(encoder)
    }
}

impl<Context> Decode<Context> for UnsignedCollectRewardsTx {
    fn decode<D: Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        Ok(UnsignedCollectRewardsTx::new(UnsignedExportTx::decode(
            decoder,
        )?))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for UnsignedCollectRewardsTx {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        Ok(UnsignedCollectRewardsTx::new(
            UnsignedExportTx::borrow_decode(decoder)?,
        ))
    }
}

impl UnsignedCollectRewardsTx {
    pub fn new(export: UnsignedExportTx) -> UnsignedCollectRewardsTx {
        UnsignedCollectRewardsTx {
            export,
            block_time: None,
        }
    }

    /// Builds the signed transaction distributing `amount` (native subunits)
    /// from the reward source. The single output carries the export portion.
    pub fn build(config: &Config, amount: u64, nonce: u64) -> Tx {
        let export = UnsignedExportTx {
            network_id: config.network_id,
            blockchain_id: config.chain_id,
            destination_chain: config.platform_chain_id,
            ins: vec![EvmInput {
                address: REWARD_SOURCE_ADDRESS,
                amount,
                asset_id: config.asset_id,
                nonce,
            }],
            exported_outputs: vec![TransferableOutput {
                asset_id: config.asset_id,
                output: TransferOutput {
                    amount: config.rewards.export_amount(amount),
                    owners: OutputOwners::single(FEE_REWARD_SHORT_ID),
                },
            }],
        };
        // the source is protocol-authorized, nothing to sign
        Tx::new(
            UnsignedAtomicTx::CollectRewards(UnsignedCollectRewardsTx::new(export)),
            vec![],
        )
    }

    pub fn block_time(&self) -> Option<u64> {
        self.block_time
    }

    pub fn capture_block_time(&mut self, config: &Config, timestamp: u64) -> u64 {
        let block_time = timestamp % config.rewards.interval;
        self.block_time = Some(block_time);
        block_time
    }

    pub fn verify(&self, config: &Config, rules: &Rules) -> Result<()> {
        if !rules.is_collect_rewards {
            return Err(BlockchainError::InvalidTransactionStructure(
                "collect rewards tx before collect rewards rules".to_string(),
            ));
        }
        self.export.verify_with_fee(config, 0)?;
        self.input()?;
        self.output()?;
        Ok(())
    }

    fn input(&self) -> Result<&EvmInput> {
        match self.export.ins.as_slice() {
            [input] => Ok(input),
            ins => Err(BlockchainError::InvalidTransactionStructure(format!(
                "collect rewards tx needs exactly 1 input, has {}",
                ins.len()
            ))),
        }
    }

    fn output(&self) -> Result<&TransferableOutput> {
        match self.export.exported_outputs.as_slice() {
            [out] => Ok(out),
            outs => Err(BlockchainError::InvalidTransactionStructure(format!(
                "collect rewards tx needs exactly 1 exported output, has {}",
                outs.len()
            ))),
        }
    }

    pub fn semantic_verify(&mut self, env: &ExecutionEnv<'_>, state: &StateDb) -> Result<()> {
        let config = env.config;
        let input = self.input()?.clone();
        let output = self.output()?.clone();

        if output.asset_id != config.asset_id {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "reward output asset {} is not the native asset",
                output.asset_id
            )));
        }
        if input.address != REWARD_SOURCE_ADDRESS {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "invalid reward input address {}",
                input.address
            )));
        }
        if output.output.owners != OutputOwners::single(FEE_REWARD_SHORT_ID) {
            return Err(BlockchainError::InvalidTransactionStructure(
                "invalid reward output owner".to_string(),
            ));
        }

        let trigger_time = state.get_state(&REWARD_SOURCE_ADDRESS, &TIMESTAMP_SLOT);
        let block_time = self.capture_block_time(config, env.block.timestamp);
        if (block_time as u128) < trigger_time {
            return Err(BlockchainError::TimeNotYetElapsed {
                block_time,
                trigger_time,
            });
        }

        let amount = config.rewards.export_amount(input.amount);
        if amount < config.rewards.min_export_amount {
            return Err(BlockchainError::ExportLimitNotReached {
                amount,
                minimum: config.rewards.min_export_amount,
            });
        }
        if output.output.amount != amount {
            return Err(BlockchainError::InvalidTransactionStructure(format!(
                "reward output {} differs from export portion {amount}",
                output.output.amount
            )));
        }
        Ok(())
    }

    pub fn atomic_ops(&self, tx_id: Id) -> Result<(Id, AtomicRequests)> {
        self.output()?;
        self.export.atomic_ops(tx_id)
    }

    /// Debits the source, credits the incentive pool and advances both
    /// reward markers. Every check runs before the first write.
    pub fn state_transfer(&self, config: &Config, state: &mut StateDb) -> Result<()> {
        let from = self.input()?;
        self.output()?;
        let rewards = &config.rewards;
        let x2c = config.x2c_rate as u128;

        let amount_export = rewards.export_amount(from.amount);
        let amount_incentive = rewards.incentive_amount(from.amount);
        let distributed = amount_export as u128 + amount_incentive as u128;
        log::debug!(
            "reward amount {} export {amount_export} incentive {amount_incentive}",
            from.amount
        );

        let amount = distributed * x2c;
        let balance = state.get_balance(&from.address);
        if balance < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: balance,
            });
        }
        let remaining = balance - amount;

        // reversed from the truncated portions so the marker tracks actual debits
        let total_rate = rewards.export_rate as u128 + rewards.incentive_rate as u128;
        let burned = (distributed * rewards.rate_denominator as u128 / total_rate)
            .saturating_sub(distributed);
        let payout = state
            .get_state(&from.address, &BALANCE_SLOT)
            .saturating_add(burned * x2c);
        if payout > remaining {
            return Err(BlockchainError::PayoutExceedsBalance {
                payout,
                balance: remaining,
            });
        }

        let nonce = state.get_nonce(&from.address);
        if nonce != from.nonce {
            return Err(BlockchainError::InvalidNonce {
                expected: nonce,
                actual: from.nonce,
            });
        }

        let mut next_trigger = state.get_state(&from.address, &TIMESTAMP_SLOT);
        if next_trigger == 0 {
            next_trigger = self.block_time.ok_or_else(|| {
                BlockchainError::EngineInvariantViolation(
                    "collect rewards executed without a captured block time".to_string(),
                )
            })? as u128;
        }

        state.sub_balance(&from.address, amount)?;
        state.set_state(&from.address, BALANCE_SLOT, payout);
        state.add_balance(&FEE_REWARD_ADDRESS, amount_incentive as u128 * x2c)?;
        state.set_state(
            &from.address,
            TIMESTAMP_SLOT,
            next_trigger + rewards.interval as u128,
        );
        state.set_nonce(&from.address, nonce + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockBody;
    use crate::storage::SharedLedger;

    fn unsigned(tx: &Tx) -> UnsignedCollectRewardsTx {
        match &tx.unsigned {
            UnsignedAtomicTx::CollectRewards(utx) => utx.clone(),
            _ => panic!("not a collect rewards tx"),
        }
    }

    fn funded_state(config: &Config, native: u64) -> StateDb {
        let mut state = StateDb::default();
        state
            .add_balance(&REWARD_SOURCE_ADDRESS, native as u128 * config.x2c_rate as u128)
            .unwrap();
        state
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            FEE_REWARD_ADDRESS.to_string(),
            "0x010000000000000000000000000000000000000c"
        );
        assert_eq!(
            REWARD_SOURCE_ADDRESS.to_string(),
            "0x0100000000000000000000000000000000000000"
        );
        assert_eq!(Address::from(FEE_REWARD_SHORT_ID), FEE_REWARD_ADDRESS);
        assert_eq!(BALANCE_SLOT[0], 1);
        assert_eq!(TIMESTAMP_SLOT[0], 2);
    }

    #[test]
    fn test_build_exports_the_export_portion() {
        let config = Config::default();
        let tx = UnsignedCollectRewardsTx::build(&config, 1_000_000, 7);
        let utx = unsigned(&tx);
        assert_eq!(utx.export.ins[0].amount, 1_000_000);
        assert_eq!(utx.export.ins[0].nonce, 7);
        assert_eq!(utx.export.exported_outputs[0].output.amount, 300_000);
        assert!(tx.credentials.is_empty());
    }

    #[test]
    fn test_block_time_is_not_encoded() {
        let config = Config::default();
        let tx = UnsignedCollectRewardsTx::build(&config, 1_000_000, 0);
        let mut utx = unsigned(&tx);
        utx.capture_block_time(&config, 7_300);
        assert_eq!(utx.block_time(), Some(100));

        let with_time = Tx::new(UnsignedAtomicTx::CollectRewards(utx), vec![]);
        assert_eq!(with_time.bytes().unwrap(), tx.bytes().unwrap());
        let decoded = Tx::from_bytes(&with_time.bytes().unwrap()).unwrap();
        assert_eq!(unsigned(&decoded).block_time(), None);
    }

    #[test]
    fn test_requires_collect_rewards_rules() {
        let config = Config::default();
        let tx = UnsignedCollectRewardsTx::build(&config, 1_000_000, 0);
        assert!(tx.verify(&config, &Rules::default()).is_err());
    }

    #[test]
    fn test_semantic_checks() {
        let config = Config::default();
        let ledger = SharedLedger::default();
        let shared_memory = ledger.chain(config.chain_id);
        let block = BlockBody {
            timestamp: 7_300,
            ..BlockBody::default()
        };
        let env = ExecutionEnv {
            config: &config,
            rules: Rules::default(),
            shared_memory: &shared_memory,
            block: &block,
            bootstrapped: true,
        };
        let mut state = StateDb::default();

        let mut utx = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 0));
        utx.semantic_verify(&env, &state).unwrap();
        assert_eq!(utx.block_time(), Some(100));

        let mut small = unsigned(&UnsignedCollectRewardsTx::build(&config, 500_000, 0));
        assert_eq!(
            small.semantic_verify(&env, &state),
            Err(BlockchainError::ExportLimitNotReached {
                amount: 150_000,
                minimum: 200_000
            })
        );

        state.set_state(&REWARD_SOURCE_ADDRESS, TIMESTAMP_SLOT, 200);
        assert_eq!(
            utx.semantic_verify(&env, &state),
            Err(BlockchainError::TimeNotYetElapsed {
                block_time: 100,
                trigger_time: 200
            })
        );

        let mut foreign = utx.clone();
        foreign.export.ins[0].address = Address::new([9u8; 20]);
        assert!(matches!(
            foreign.semantic_verify(&env, &StateDb::default()),
            Err(BlockchainError::InvalidTransactionStructure(_))
        ));
    }

    #[test]
    fn test_state_transfer_moves_portions_and_markers() {
        let config = Config::default();
        let x2c = config.x2c_rate as u128;
        let mut state = funded_state(&config, 1_000_000);
        let mut utx = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 0));
        utx.capture_block_time(&config, 7_300);

        utx.state_transfer(&config, &mut state).unwrap();

        // 300k exported + 300k to the pool, 400k burned
        assert_eq!(state.get_balance(&REWARD_SOURCE_ADDRESS), 400_000 * x2c);
        assert_eq!(state.get_balance(&FEE_REWARD_ADDRESS), 300_000 * x2c);
        assert_eq!(
            state.get_state(&REWARD_SOURCE_ADDRESS, &BALANCE_SLOT),
            400_000 * x2c
        );
        assert_eq!(
            state.get_state(&REWARD_SOURCE_ADDRESS, &TIMESTAMP_SLOT),
            100 + 3_600
        );
        assert_eq!(state.get_nonce(&REWARD_SOURCE_ADDRESS), 1);
    }

    #[test]
    fn test_rewards_are_not_double_spendable() {
        let config = Config::default();
        let mut state = funded_state(&config, 1_000_000);
        let mut utx = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 0));
        utx.capture_block_time(&config, 0);
        utx.state_transfer(&config, &mut state).unwrap();

        let mut again = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 1));
        again.capture_block_time(&config, 0);
        let result = again.state_transfer(&config, &mut state);
        assert!(matches!(
            result,
            Err(BlockchainError::InsufficientFunds { .. })
                | Err(BlockchainError::PayoutExceedsBalance { .. })
        ));
    }

    #[test]
    fn test_payout_marker_bounded_by_balance() {
        let config = Config::default();
        let x2c = config.x2c_rate as u128;
        let mut state = funded_state(&config, 1_000_000);
        state.set_state(&REWARD_SOURCE_ADDRESS, BALANCE_SLOT, 1);
        let mut utx = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 0));
        utx.capture_block_time(&config, 0);

        assert_eq!(
            utx.state_transfer(&config, &mut state),
            Err(BlockchainError::PayoutExceedsBalance {
                payout: 400_000 * x2c + 1,
                balance: 400_000 * x2c
            })
        );
        assert_eq!(state.get_balance(&REWARD_SOURCE_ADDRESS), 1_000_000 * x2c);
    }

    #[test]
    fn test_nonce_mismatch_leaves_balances_untouched() {
        let config = Config::default();
        let x2c = config.x2c_rate as u128;
        let mut state = funded_state(&config, 1_000_000);
        let mut utx = unsigned(&UnsignedCollectRewardsTx::build(&config, 1_000_000, 5));
        utx.capture_block_time(&config, 0);

        assert_eq!(
            utx.state_transfer(&config, &mut state),
            Err(BlockchainError::InvalidNonce {
                expected: 0,
                actual: 5
            })
        );
        assert_eq!(state.get_balance(&REWARD_SOURCE_ADDRESS), 1_000_000 * x2c);
        assert_eq!(state.get_balance(&FEE_REWARD_ADDRESS), 0);
        assert_eq!(state.get_state(&REWARD_SOURCE_ADDRESS, &BALANCE_SLOT), 0);
    }
}
