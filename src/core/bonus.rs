//! Bonus blocks: historical blocks whose atomic transactions were already
//! applied to shared memory at another height. Their UTXO presence is not
//! checked and their requests are not applied again on accept.

use crate::config::Network;
use crate::core::Id;
use crate::error::{BlockchainError, Result};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

pub const MAINNET_BONUS_BLOCKS: &[(u64, &str)] = &[
    (102972, "Njm9TcLUXRojZk8YhEM6ksvfiPdC1TME4zJvGaDXgzMCyB6oB"),
    (103105, "BYqLB6xpqy7HsAgP2XNfGE8Ubg1uEzse5mBPTSJH9z5s8pvMa"),
    (103143, "AfWvJH3rB2fdHuPWQp6qYNCFVT29MooQPRigD88rKKwUDEDhq"),
    (103183, "2KPW9G5tiNF14tZNfG4SqHuQrtUYVZyxuof37aZ7AnTKrQdsHn"),
    (103197, "pE93VXY3N5QKfwsEFcM9i59UpPFgeZ8nxpJNaGaDQyDgsscNf"),
    (103203, "2czmtnBS44VCWNRFUM89h4Fe9m3ZeZVYyh7Pe3FhNqjRNgPXhZ"),
    (103208, "esx5J962LtYm2aSrskpLai5e4CMMsaS1dsu9iuLGJ3KWgSu2M"),
    (103209, "DK9NqAJGry1wAo767uuYc1dYXAjUhzwka6vi8d9tNheqzGUTd"),
    (103259, "i1HoerJ1axognkUKKL58FvF9aLrbZKtv7TdKLkT5kgzoeU1vB"),
    (103261, "2DpCuBaH94zKKFNY2XTs4GeJcwsEv6qT2DHc59S8tdg97GZpcJ"),
    (103266, "2ez4CA7w4HHr8SSobHQUAwFgj2giRNjNFUZK9JvrZFa1AuRj6X"),
    (103287, "2QBNMMFJmhVHaGF45GAPszKyj1gK6ToBERRxYvXtM7yfrdUGPK"),
    (103339, "2pSjfo7rkFCfZ2CqAxqfw8vqM2CU2nVLHrFZe3rwxz43gkVuGo"),
    (103346, "2SiSziHHqPjb1qkw7CdGYupokiYpd2b7mMqRiyszurctcA5AKr"),
    (103350, "2F5tSQbdTfhZxvkxZqdFp7KR3FrJPKEsDLQK7KtPhNXj1EZAh4"),
    (103358, "2tCe88ur6MLQcVgwE5XxoaHiTGtSrthwKN3SdbHE4kWiQ7MSTV"),
    (103437, "21o2fVTnzzmtgXqkV1yuQeze7YEQhR5JB31jVVD9oVUnaaV8qm"),
    (103472, "2nG4exd9eUoAGzELfksmBR8XDCKhohY1uDKRFzEXJG4M8p3qA7"),
    (103478, "63YLdYXfXc5tY3mwWLaDsbXzQHYmwWVxMP7HKbRh4Du3C2iM1"),
    (103493, "soPweZ8DGaoUMjrnzjH3V2bypa7ZvvfqBan4UCsMUxMP759gw"),
    (103514, "2dNkpQF4mooveyUDfBYQTBfsGDV4wkncQPpEw4kHKfSTSTo5x"),
    (103536, "PJTkRrHvKZ1m4AQdPND1MBpUXpCrGN4DDmXmJQAiUrsxPoLQX"),
    (103545, "22ck2Z7cC38hmBfX2v3jMWxun8eD8psNaicfYeokS67DxwmPTx"),
    (103547, "pTf7gfk1ksj7bqMrLyMCij8FBKth1uRqQrtfykMFeXhx5xnrL"),
    (103554, "9oZh4qyBCcVwSGyDoUzRAuausvPJN3xH6nopKS6bwYzMfLoQ2"),
    (103555, "MjExz2z1qhwugc1tAyiGxRsCq4GvJwKfyyS29nr4tRVB8ooic"),
    (103559, "cwJusfmn98TW3DjAbfLRN9utYR24KAQ82qpAXmVSvjHyJZuM2"),
    (103561, "2YgxGHns7Z2hMMHJsPCgVXuJaL7x1b3gnHbmSCfCdyAcYGr6mx"),
    (103563, "2AXxT3PSEnaYHNtBTnYrVTf24TtKDWjky9sqoFEhydrGXE9iKH"),
    (103564, "Ry2sfjFfGEnJxRkUGFSyZNn7GR3m4aKAf1scDW2uXSNQB568Y"),
    (103569, "21Jys8UNURmtckKSV89S2hntEWymJszrLQbdLaNcbXcxDAsQSa"),
    (103570, "sg6wAwFBsPQiS5Yfyh41cVkCRQbrrXsxXmeNyQ1xkunf2sdyv"),
    (103575, "z3BgePPpCXq1mRBRvUi28rYYxnEtJizkUEHnDBrcZeVA7MFVk"),
    (103577, "uK5Ff9iBfDtREpVv9NgCQ1STD1nzLJG3yrfibHG4mGvmybw6f"),
    (103578, "Qv5v5Ru8ArfnWKB1w6s4G5EYPh7TybHJtF6UsVwAkfvZFoqmj"),
    (103582, "7KCZKBpxovtX9opb7rMRie9WmW5YbZ8A4HwBBokJ9eSHpZPqx"),
    (103587, "2AfTQ2FXNj9bkSUQnud9pFXULx6EbF7cbbw6i3ayvc2QNhgxfF"),
    (103590, "2gTygYckZgFZfN5QQWPaPBD3nabqjidV55mwy1x1Nd4JmJAwaM"),
    (103591, "2cUPPHy1hspr2nAKpQrrAEisLKkaWSS9iF2wjNFyFRs8vnSkKK"),
    (103594, "5MptSdP6dBMPSwk9GJjeVe39deZJTRh9i82cgNibjeDffrrTf"),
    (103597, "2J8z7HNv4nwh82wqRGyEHqQeuw4wJ6mCDCSvUgusBu35asnshK"),
    (103598, "2i2FP6nJyvhX9FR15qN2D9AVoK5XKgBD2i2AQ7FoSpfowxvQDX"),
    (103603, "2v3smb35s4GLACsK4Zkd2RcLBLdWA4huqrvq8Y3VP4CVe8kfTM"),
    (103604, "b7XfDDLgwB12DfL7UTWZoxwBpkLPL5mdHtXngD94Y2RoeWXSh"),
    (103607, "PgaRk1UAoUvRybhnXsrLq5t6imWhEa6ksNjbN6hWgs4qPrSzm"),
    (103612, "2oueNTj4dUE2FFtGyPpawnmCCsy6EUQeVHVLZy8NHeQmkAciP4"),
    (103614, "2YHZ1KymFjiBhpXzgt6HXJhLSt5SV9UQ4tJuUNjfN1nQQdm5zz"),
    (103617, "amgH2C1s9H3Av7vSW4y7n7TXb9tKyKHENvrDXutgNN6nsejgc"),
    (103618, "fV8k1U8oQDmfVwK66kAwN73aSsWiWhm8quNpVnKmSznBycV2W"),
    (103621, "Nzs93kFTvcXanFUp9Y8VQkKYnzmH8xykxVNFJTkdyAEeuxWbP"),
    (103623, "2rAsBj3emqQa13CV8r5fTtHogs4sXnjvbbXVzcKPi3WmzhpK9D"),
    (103624, "2JbuExUGKW5mYz5KfXATwq1ibRDimgks9wEdYGNSC6Ttey1R4U"),
    (103627, "tLLijh7oKfvWT1yk9zRv4FQvuQ5DAiuvb5kHCNN9zh4mqkFMG"),
    (103628, "dWBsRYRwFrcyi3DPdLoHsL67QkZ5h86hwtVfP94ZBaY18EkmF"),
    (103629, "XMoEsew2DhSgQaydcJFJUQAQYP8BTNTYbEJZvtbrV2QsX7iE3"),
    (103630, "2db2wMbVAoCc5EUJrsBYWvNZDekqyY8uNpaaVapdBAQZ5oRaou"),
    (103633, "2QiHZwLhQ3xLuyyfcdo5yCUfoSqWDvRZox5ECU19HiswfroCGp"),
];

static MAINNET: OnceCell<BonusBlocks> = OnceCell::new();

/// Read-only `height -> block id` table
#[derive(Debug, Clone, Default)]
pub struct BonusBlocks {
    heights: Arc<HashMap<u64, Id>>,
}

impl BonusBlocks {
    /// Table for `network`. The mainnet table is parsed once per process.
    pub fn for_network(network: Network) -> Result<BonusBlocks> {
        match network {
            Network::Mainnet => MAINNET
                .get_or_try_init(|| BonusBlocks::from_entries(MAINNET_BONUS_BLOCKS))
                .cloned(),
            Network::Testnet | Network::Local => Ok(BonusBlocks::default()),
        }
    }

    pub fn from_entries(entries: &[(u64, &str)]) -> Result<BonusBlocks> {
        let mut heights = HashMap::with_capacity(entries.len());
        for (height, id) in entries {
            let id = id.parse::<Id>().map_err(|e| {
                BlockchainError::Config(format!("bad bonus block at height {height}: {e}"))
            })?;
            heights.insert(*height, id);
        }
        Ok(BonusBlocks {
            heights: Arc::new(heights),
        })
    }

    pub fn from_map(heights: HashMap<u64, Id>) -> BonusBlocks {
        BonusBlocks {
            heights: Arc::new(heights),
        }
    }

    pub fn is_bonus(&self, height: u64, block_id: &Id) -> bool {
        self.heights.get(&height) == Some(block_id)
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Entries sorted by height
    pub fn entries(&self) -> Vec<(u64, Id)> {
        let mut entries: Vec<(u64, Id)> = self.heights.iter().map(|(h, id)| (*h, *id)).collect();
        entries.sort_unstable_by_key(|(height, _)| *height);
        entries
    }
}
