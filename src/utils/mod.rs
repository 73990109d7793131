//! Utility functions and helpers
//!
//! Hashing, cb58 text encoding and the bincode wrappers used for every
//! persisted or hashed structure.

pub mod crypto;
pub mod serialization;

pub use crypto::{cb58_decode, cb58_encode, current_timestamp, sha256_array, sha256_digest};

pub use serialization::{deserialize, serialize};
