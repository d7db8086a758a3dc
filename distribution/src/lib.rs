//! Distribution Orchestrator
//!
//! Executes a batch of transfers from one system wallet to many
//! recipients as a single all-or-nothing operation, auto-issuing any
//! shortfall before distributing.
//!
//! # Layering
//!
//! Batch policy (size bound, per-line sanity) lives here; atomicity
//! lives in `ledger-core`: the issuance and every line commit in one
//! storage batch, so a failing line rolls everything back, including
//! the issuance.
//!
//! # Example
//!
//! ```no_run
//! use distribution::{Config, DistributionOrchestrator};
//! use ledger_core::{DistributionLine, Ledger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> distribution::Result<()> {
//!     let ledger = Arc::new(Ledger::open(ledger_core::Config::default()).await?);
//!     let treasury = ledger.register_system_account("treasury")?;
//!     let alice = ledger.register_user("alice")?;
//!
//!     let orchestrator = DistributionOrchestrator::new(ledger, Config::default())?;
//!     let receipt = orchestrator
//!         .distribute(
//!             treasury,
//!             &[DistributionLine { recipient: alice, amount: 100 }],
//!             "initial grant",
//!             None,
//!         )
//!         .await?;
//!     println!("committed {} transactions", receipt.transactions.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod orchestrator;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::DistributionOrchestrator;
