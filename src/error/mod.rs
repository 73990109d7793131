//! Error handling for block verification and the atomic transaction sub-protocol
//!
//! Every fallible operation in the crate returns [`Result`]. The variants follow
//! the lifecycle of a block: syntactic failures, cross-chain presence failures,
//! transaction structure failures, ledger execution failures and engine
//! invariant violations.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Database-related errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Malformed identifier or address text
    InvalidId(String),
    /// Block could not be built or decoded
    InvalidBlock(String),
    /// Block failed the structural / rule-set checks
    SyntacticVerification(String),
    /// An import references a record that is not in shared memory
    MissingCrossChainRecord(String),
    /// Wrong input/output counts, assets, owners or amounts
    InvalidTransactionStructure(String),
    /// The reward interval has not elapsed yet
    TimeNotYetElapsed { block_time: u64, trigger_time: u128 },
    /// The distributable reward is below the export minimum
    ExportLimitNotReached { amount: u64, minimum: u64 },
    /// The running payout marker would exceed the source balance
    PayoutExceedsBalance { payout: u128, balance: u128 },
    /// Input nonce does not match the account nonce
    InvalidNonce { expected: u64, actual: u64 },
    /// Insufficient funds for a ledger debit
    InsufficientFunds { required: u128, available: u128 },
    /// The parent state of a block is not available locally
    UnknownAncestor(String),
    /// Mempool refused a transaction
    Mempool(String),
    /// Internal state that must exist is missing
    EngineInvariantViolation(String),
}

impl BlockchainError {
    /// Outcomes that only mean "no reward this time".
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            BlockchainError::TimeNotYetElapsed { .. } | BlockchainError::ExportLimitNotReached { .. }
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::InvalidId(msg) => write!(f, "Invalid identifier: {msg}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::SyntacticVerification(msg) => {
                write!(f, "Syntactic block verification failed: {msg}")
            }
            BlockchainError::MissingCrossChainRecord(msg) => write!(f, "Missing UTXOs: {msg}"),
            BlockchainError::InvalidTransactionStructure(msg) => {
                write!(f, "Invalid transaction structure: {msg}")
            }
            BlockchainError::TimeNotYetElapsed {
                block_time,
                trigger_time,
            } => write!(
                f,
                "Time has not passed: block time {block_time} < trigger time {trigger_time}"
            ),
            BlockchainError::ExportLimitNotReached { amount, minimum } => write!(
                f,
                "Export limit not yet reached: {amount} < {minimum}"
            ),
            BlockchainError::PayoutExceedsBalance { payout, balance } => write!(
                f,
                "Payed out fees exceed balance: payout {payout}, balance {balance}"
            ),
            BlockchainError::InvalidNonce { expected, actual } => {
                write!(f, "Invalid nonce: expected {expected}, got {actual}")
            }
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::UnknownAncestor(msg) => write!(f, "Unknown ancestor: {msg}"),
            BlockchainError::Mempool(msg) => write!(f, "Mempool error: {msg}"),
            BlockchainError::EngineInvariantViolation(msg) => {
                write!(f, "Engine invariant violation: {msg}")
            }
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
