//! Identifiers used across chains: 32-byte ids, 20-byte short ids and
//! 20-byte ledger addresses.
//!
//! Ids and short ids render as cb58, addresses as `0x`-prefixed hex. The same
//! text forms are used in configuration files.

use crate::error::{BlockchainError, Result};
use crate::utils::{cb58_decode, cb58_encode, sha256_array};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub struct Id([u8; 32]);

impl Id {
    pub const EMPTY: Id = Id([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Id {
        Id(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Id> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| BlockchainError::InvalidId(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Id(array))
    }

    /// sha256 of arbitrary bytes
    pub fn hash_of(data: &[u8]) -> Id {
        Id(sha256_array(data))
    }

    /// Derives a child id from this id and an index, e.g. the id of output
    /// `index` of the transaction with this id.
    pub fn prefix(&self, index: u32) -> Id {
        let mut data = self.0.to_vec();
        data.extend_from_slice(&index.to_be_bytes());
        Id::hash_of(&data)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_empty(&self) -> bool {
        *self == Id::EMPTY
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cb58_encode(&self.0))
    }
}

impl FromStr for Id {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Id> {
        Id::from_slice(&cb58_decode(s)?)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub struct ShortId([u8; 20]);

impl ShortId {
    pub const fn new(bytes: [u8; 20]) -> ShortId {
        ShortId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cb58_encode(&self.0))
    }
}

impl FromStr for ShortId {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<ShortId> {
        let bytes = cb58_decode(s)?;
        let array: [u8; 20] = bytes.as_slice().try_into().map_err(|_| {
            BlockchainError::InvalidId(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(ShortId(array))
    }
}

/// Account address in the local ledger
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Address {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<ShortId> for Address {
    fn from(id: ShortId) -> Self {
        Address(id.0)
    }
}

impl From<Address> for ShortId {
    fn from(address: Address) -> Self {
        ShortId(address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Address> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| BlockchainError::InvalidId(format!("invalid address {s}: {e}")))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| BlockchainError::InvalidId(format!("address must be 20 bytes: {s}")))?;
        Ok(Address(array))
    }
}

// Text form in configuration and JSON, bincode keeps the raw bytes.
macro_rules! impl_text_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_text_serde!(Id);
impl_text_serde!(ShortId);
impl_text_serde!(Address);
