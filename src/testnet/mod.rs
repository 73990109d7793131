//! Test fixtures
//!
//! Isolated engines over temporary sled directories, funded genesis
//! configurations and builders for blocks and atomic transactions.

pub mod test_utils;

pub use test_utils::*;
