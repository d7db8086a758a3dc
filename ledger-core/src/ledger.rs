//! Main ledger orchestration layer
//!
//! This module ties together storage, locking, engine, and query
//! components into a high-level API for token transfer processing.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, TransferRequest};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let treasury = ledger.register_system_account("treasury")?;
//!     let alice = ledger.register_user("alice")?;
//!
//!     let issue = TransferRequest::new(treasury, treasury, 1_000, "ops");
//!     ledger.transfer(&issue, None).await?;
//!
//!     let grant = TransferRequest::new(treasury, alice, 250, "ops");
//!     ledger.transfer(&grant, None).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    engine::TransferEngine,
    locks::WalletLocks,
    metrics::Metrics,
    query::LedgerQuery,
    storage::{Storage, StorageStats},
    types::{
        ConservationReport, DistributionLine, DistributionReceipt, HistoryFilter, Owner,
        OwnerClass, SupplyStats, Transaction, TransferReceipt, TransferRequest, Wallet, WalletId,
    },
    Config, Error, Result,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Main ledger interface
pub struct Ledger {
    /// Transfer engine (the sole writer path)
    engine: TransferEngine,

    /// Read-side queries
    query: LedgerQuery,

    /// Shared storage
    storage: Arc<Storage>,

    /// Shared per-wallet lock table
    locks: Arc<WalletLocks>,

    /// Metrics collector
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let locks = Arc::new(WalletLocks::new());
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let engine = TransferEngine::new(storage.clone(), locks.clone(), metrics.clone());
        let query = LedgerQuery::new(storage.clone());

        Ok(Self {
            engine,
            query,
            storage,
            locks,
            metrics,
        })
    }

    // Provisioning
    //
    // Owners are created once; the engine only reads ownership class
    // for policy decisions afterwards.

    /// Provision a user with an empty wallet
    pub fn register_user(&self, display_name: impl Into<String>) -> Result<WalletId> {
        let wallet_id = WalletId::new();
        let owner = Owner::User {
            display_name: display_name.into(),
            deleted_at: None,
        };
        self.storage.create_wallet(wallet_id, &owner)?;
        Ok(wallet_id)
    }

    /// Provision a system account with an empty wallet
    pub fn register_system_account(&self, name: impl Into<String>) -> Result<WalletId> {
        let wallet_id = WalletId::new();
        let owner = Owner::System { name: name.into() };
        self.storage.create_wallet(wallet_id, &owner)?;
        Ok(wallet_id)
    }

    /// Rename a user (display name is mutable)
    pub fn rename_user(&self, wallet: WalletId, display_name: impl Into<String>) -> Result<()> {
        match self.storage.get_owner(wallet)? {
            Some(Owner::User { deleted_at, .. }) => {
                let owner = Owner::User {
                    display_name: display_name.into(),
                    deleted_at,
                };
                self.storage.put_owner(wallet, &owner)
            }
            Some(Owner::System { .. }) => Err(Error::InvariantViolation(
                "system account names are immutable".to_string(),
            )),
            None => Err(Error::WalletNotFound(wallet)),
        }
    }

    /// Soft-delete a user; the wallet and its history remain
    pub fn deactivate_user(&self, wallet: WalletId) -> Result<()> {
        match self.storage.get_owner(wallet)? {
            Some(Owner::User { display_name, .. }) => {
                let owner = Owner::User {
                    display_name,
                    deleted_at: Some(Utc::now()),
                };
                self.storage.put_owner(wallet, &owner)
            }
            Some(Owner::System { .. }) => Err(Error::InvariantViolation(
                "system accounts have no delete path".to_string(),
            )),
            None => Err(Error::WalletNotFound(wallet)),
        }
    }

    // Freeze administration

    /// Set a wallet's frozen flag
    ///
    /// System wallets can never be frozen. Takes the wallet's
    /// exclusive section so the flag cannot be lost to a concurrently
    /// committing transfer.
    pub async fn set_frozen(&self, wallet_id: WalletId, frozen: bool) -> Result<()> {
        if frozen && self.storage.resolve_owner_class(wallet_id)? == OwnerClass::System {
            return Err(Error::InvariantViolation(format!(
                "system wallet {} cannot be frozen",
                wallet_id
            )));
        }

        let _guards = self.locks.acquire(&[wallet_id]).await;

        let mut wallet = self
            .storage
            .get_wallet(wallet_id)?
            .ok_or(Error::WalletNotFound(wallet_id))?;
        wallet.frozen = frozen;
        self.storage.put_wallet(&wallet)?;

        tracing::info!(wallet = %wallet_id, frozen, "Wallet freeze flag updated");
        Ok(())
    }

    // Operations

    /// Execute a single transfer (issuance, distribution, pool, or normal)
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        deadline: Option<Duration>,
    ) -> Result<TransferReceipt> {
        self.engine.transfer(request, deadline).await
    }

    /// Atomically distribute a batch from a system wallet,
    /// auto-issuing any shortfall
    ///
    /// Batch policy (size bound, non-empty, line sanity) lives one
    /// layer up in the distribution orchestrator; this is the atomic
    /// primitive it calls.
    pub async fn distribute(
        &self,
        source: WalletId,
        lines: &[DistributionLine],
        deadline: Option<Duration>,
    ) -> Result<DistributionReceipt> {
        self.engine.distribute(source, lines, deadline).await
    }

    // Queries

    /// Get wallet by ID
    pub fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        self.storage
            .get_wallet(wallet_id)?
            .ok_or(Error::WalletNotFound(wallet_id))
    }

    /// Get owner record for a wallet
    pub fn get_owner(&self, wallet_id: WalletId) -> Result<Owner> {
        self.storage
            .get_owner(wallet_id)?
            .ok_or(Error::WalletNotFound(wallet_id))
    }

    /// Transaction history for a wallet, newest first
    pub fn history(&self, wallet: WalletId, filter: HistoryFilter) -> Result<Vec<Transaction>> {
        self.query.history(wallet, filter)
    }

    /// Supply metrics
    pub fn supply_stats(&self) -> Result<SupplyStats> {
        self.query.supply_stats()
    }

    /// Recompute the conservation invariant
    pub fn check_conservation(&self) -> Result<ConservationReport> {
        self.query.check_conservation()
    }

    /// Storage statistics
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
