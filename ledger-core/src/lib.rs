//! Token Ledger Core
//!
//! Transfer-centric ledger: every economic event (issuance,
//! distribution, peer transfer, fee collection) is a directed
//! wallet-to-wallet transfer of an integer token amount.
//!
//! # Architecture
//!
//! - **Single Write Path**: the transfer engine is the only component
//!   that mutates wallet balances or appends ledger records
//! - **Per-Wallet Locking**: exclusive sections per wallet identity,
//!   acquired in a deterministic order; disjoint wallets run in parallel
//! - **Atomic Commit**: balance mutations and the ledger append land
//!   in a single storage batch
//!
//! # Invariants
//!
//! - Non-negativity: no wallet balance is ever observed negative
//! - Conservation: Σ(balances) == Σ(issuance amounts) after every commit
//! - Append-only: transactions are never modified or deleted
//! - Per-wallet serialization: sufficiency checks cannot race

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use types::{
    ConservationReport, DistributionLine, DistributionReceipt, HistoryFilter, Owner, OwnerClass,
    SupplyStats, Transaction, TransferKind, TransferReceipt, TransferRequest, TxId, TxType,
    Wallet, WalletId,
};
