//! Error types for the ledger

use crate::types::WalletId;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// None of these leave partial effects behind; a failed operation
/// mutates nothing.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested amount was zero or negative
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(i64),

    /// Wallet does not exist
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// Wallet is frozen and rejects sends and receives
    #[error("Wallet frozen: {0}")]
    WalletFrozen(WalletId),

    /// Sender balance below requested amount
    #[error("Insufficient balance in wallet {wallet}: has {has}, needs {needs}")]
    InsufficientBalance {
        /// Sender wallet
        wallet: WalletId,
        /// Balance at check time
        has: i64,
        /// Requested amount
        needs: i64,
    },

    /// Self-transfer attempted on a non-system wallet
    #[error("Unauthorized issuance from wallet {0}: not system-owned")]
    UnauthorizedIssuance(WalletId),

    /// One line of a distribution batch failed; the whole batch rolled back
    #[error("Distribution batch failed at line {line}: {source}")]
    BatchPartialFailure {
        /// Zero-based index of the offending line
        line: usize,
        /// The line's own error
        #[source]
        source: Box<Error>,
    },

    /// Append attempted under an already-committed transaction ID
    #[error("Transaction already exists: {0} (ledger records are immutable)")]
    TransactionExists(crate::types::TxId),

    /// Caller deadline expired before any mutation committed
    #[error("Deadline exceeded before commit")]
    DeadlineExceeded,

    /// Invariant violation (balance overflow, freezing a system wallet, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage unavailable (RocksDB failure), fatal rather than a validation error
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
