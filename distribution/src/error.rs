//! Error types for the distribution orchestrator

use thiserror::Error;

/// Result type for distribution operations
pub type Result<T> = std::result::Result<T, Error>;

/// Distribution errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error (including per-line batch failures)
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Batch has no lines
    #[error("Distribution batch is empty")]
    EmptyBatch,

    /// Batch exceeds the configured recipient bound
    #[error("Distribution batch too large: {size} lines (max {max})")]
    BatchTooLarge {
        /// Lines in the rejected batch
        size: usize,
        /// Configured upper bound
        max: usize,
    },

    /// A line failed policy validation before execution
    #[error("Invalid distribution line {line}: {reason}")]
    InvalidLine {
        /// Zero-based index of the offending line
        line: usize,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
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
