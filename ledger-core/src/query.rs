//! Ledger query service
//!
//! Read-side history, supply, and consistency-check queries. No side
//! effects; reads always observe whole committed transfers because
//! every write path goes through one atomic storage batch.

use crate::{
    storage::Storage,
    types::{
        ConservationReport, HistoryFilter, OwnerClass, SupplyStats, Transaction, WalletId,
    },
    Error, Result,
};
use std::sync::Arc;

/// Read-only view over the ledger
pub struct LedgerQuery {
    storage: Arc<Storage>,
}

impl LedgerQuery {
    /// Create query service over shared storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Transaction history for a wallet, newest first
    ///
    /// Covers both sides: transfers sent and received, issuance once.
    pub fn history(&self, wallet: WalletId, filter: HistoryFilter) -> Result<Vec<Transaction>> {
        if self.storage.get_wallet(wallet)?.is_none() {
            return Err(Error::WalletNotFound(wallet));
        }

        let mut transactions = Vec::new();
        for tx_id in self.storage.history_tx_ids(wallet)? {
            let tx = self.storage.get_transaction(tx_id)?.ok_or_else(|| {
                Error::StorageUnavailable(format!(
                    "history index references missing transaction {}",
                    tx_id
                ))
            })?;
            if filter.matches(&tx) {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    /// Supply metrics: total issuance plus the user/system balance split
    ///
    /// Both sides come from one storage snapshot, so a transfer
    /// committing mid-query is counted on both or neither.
    pub fn supply_stats(&self) -> Result<SupplyStats> {
        let (total_issuance, wallets) = self.storage.supply_scan()?;

        let mut circulating: i64 = 0;
        let mut system_pool: i64 = 0;
        for (wallet, class) in wallets {
            match class {
                OwnerClass::System => {
                    system_pool = system_pool.checked_add(wallet.balance).ok_or_else(|| {
                        Error::InvariantViolation("system pool overflows i64".to_string())
                    })?;
                }
                // Unowned wallets cannot exist (1:1 provisioning);
                // count them as circulating rather than hiding them
                OwnerClass::User | OwnerClass::Unknown => {
                    circulating = circulating.checked_add(wallet.balance).ok_or_else(|| {
                        Error::InvariantViolation("circulating supply overflows i64".to_string())
                    })?;
                }
            }
        }

        Ok(SupplyStats {
            total_issuance,
            circulating,
            system_pool,
        })
    }

    /// Recompute the conservation invariant
    ///
    /// `sum(all wallet balances) == sum(issuance amounts)`. A
    /// monitoring check, never enforced inline on the write path.
    pub fn check_conservation(&self) -> Result<ConservationReport> {
        let stats = self.supply_stats()?;
        let total_balances = stats
            .circulating
            .checked_add(stats.system_pool)
            .ok_or_else(|| {
                Error::InvariantViolation("total balances overflow i64".to_string())
            })?;

        let report = ConservationReport {
            total_issuance: stats.total_issuance,
            total_balances,
        };

        if !report.holds() {
            tracing::error!(
                total_issuance = report.total_issuance,
                total_balances = report.total_balances,
                "Conservation invariant violated"
            );
        }

        Ok(report)
    }
}
