//! Rule resolution: which protocol rule-set applies at a given height and time.

use crate::config::ForkSchedule;
use crate::core::BlockBody;

/// Active protocol rules at one point of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rules {
    pub height: u64,
    pub timestamp: u64,
    /// Blocks may carry more than one atomic transaction
    pub is_batch_atomic_txs: bool,
    /// Blocks must carry a base fee
    pub is_fee_market: bool,
    /// CollectRewards transactions are valid
    pub is_collect_rewards: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RuleResolver {
    schedule: ForkSchedule,
}

impl RuleResolver {
    pub fn new(schedule: ForkSchedule) -> RuleResolver {
        RuleResolver { schedule }
    }

    pub fn rules(&self, height: u64, timestamp: u64) -> Rules {
        Rules {
            height,
            timestamp,
            is_batch_atomic_txs: is_active(self.schedule.batch_atomic_txs_time, timestamp),
            is_fee_market: is_active(self.schedule.fee_market_time, timestamp),
            is_collect_rewards: is_active(self.schedule.collect_rewards_time, timestamp),
        }
    }

    pub fn rules_for(&self, body: &BlockBody) -> Rules {
        self.rules(body.height, body.timestamp)
    }
}

fn is_active(activation: Option<u64>, timestamp: u64) -> bool {
    activation.is_some_and(|at| timestamp >= at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_boundaries() {
        let resolver = RuleResolver::new(ForkSchedule {
            batch_atomic_txs_time: Some(100),
            fee_market_time: None,
            collect_rewards_time: Some(0),
        });

        let before = resolver.rules(1, 99);
        assert!(!before.is_batch_atomic_txs);
        assert!(!before.is_fee_market);
        assert!(before.is_collect_rewards);

        let at = resolver.rules(2, 100);
        assert!(at.is_batch_atomic_txs);
        assert!(!at.is_fee_market);
        assert_eq!(at.height, 2);
    }
}
