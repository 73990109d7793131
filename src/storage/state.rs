//! Account state of the local ledger: balances, nonces and per-account
//! storage slots.
//!
//! Balances are in ledger units (native subunits times `x2c_rate`). Each
//! verified block owns a copy of the state it produces; only accepted state
//! is persisted.

use crate::core::Address;
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type StorageSlot = [u8; 32];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Account {
    pub balance: u128,
    pub nonce: u64,
    pub storage: BTreeMap<StorageSlot, [u8; 32]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct StateDb {
    accounts: BTreeMap<Address, Account>,
}

impl StateDb {
    pub fn new() -> StateDb {
        StateDb::default()
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn get_balance(&self, address: &Address) -> u128 {
        self.accounts.get(address).map_or(0, |a| a.balance)
    }

    pub fn add_balance(&mut self, address: &Address, amount: u128) -> Result<()> {
        let account = self.accounts.entry(*address).or_default();
        account.balance = account.balance.checked_add(amount).ok_or_else(|| {
            BlockchainError::InvalidTransactionStructure(format!(
                "balance overflow for {address}"
            ))
        })?;
        Ok(())
    }

    pub fn sub_balance(&mut self, address: &Address, amount: u128) -> Result<()> {
        let available = self.get_balance(address);
        if available < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.accounts.entry(*address).or_default().balance = available - amount;
        Ok(())
    }

    pub fn get_nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.nonce)
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.accounts.entry(*address).or_default().nonce = nonce;
    }

    /// Slot value read as a big-endian integer; unset slots read as zero.
    pub fn get_state(&self, address: &Address, slot: &StorageSlot) -> u128 {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(slot))
            .map_or(0, |word| {
                let mut low = [0u8; 16];
                low.copy_from_slice(&word[16..]);
                u128::from_be_bytes(low)
            })
    }

    pub fn set_state(&mut self, address: &Address, slot: StorageSlot, value: u128) {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        self.accounts
            .entry(*address)
            .or_default()
            .storage
            .insert(slot, word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balances() {
        let alice = Address::new([1u8; 20]);
        let mut state = StateDb::new();
        assert_eq!(state.get_balance(&alice), 0);

        state.add_balance(&alice, 50).unwrap();
        state.sub_balance(&alice, 20).unwrap();
        assert_eq!(state.get_balance(&alice), 30);

        assert_eq!(
            state.sub_balance(&alice, 31),
            Err(BlockchainError::InsufficientFunds {
                required: 31,
                available: 30
            })
        );
        assert_eq!(state.get_balance(&alice), 30);
    }

    #[test]
    fn test_storage_words_are_big_endian() {
        let alice = Address::new([1u8; 20]);
        let mut slot = [0u8; 32];
        slot[0] = 7;
        let mut state = StateDb::new();
        assert_eq!(state.get_state(&alice, &slot), 0);

        state.set_state(&alice, slot, 0x0102);
        assert_eq!(state.get_state(&alice, &slot), 0x0102);
        let word = state.account(&alice).unwrap().storage[&slot];
        assert_eq!(&word[30..], &[0x01, 0x02]);
    }
}
