//! Transfer engine: classification, validation, atomic application
//!
//! The single explicit call path for every balance mutation. Each
//! concern lives in one reviewable function: `classify` decides the
//! transfer kind, `validate_*` runs the precondition chain, and the
//! apply step hands one `WriteBatch` to storage. No invariant check
//! lives anywhere else.
//!
//! Concurrency: every operation acquires the exclusive sections of
//! the wallets it touches (in `WalletId` order, see [`crate::locks`])
//! before reading balances, and releases them only after the atomic
//! commit. Two transfers draining the same wallet therefore cannot
//! both pass the sufficiency check.

use crate::{
    locks::{commit_timestamp_ms, record_commit, WalletLocks},
    metrics::Metrics,
    storage::Storage,
    types::{
        DistributionLine, DistributionReceipt, OwnerClass, Transaction, TransferKind,
        TransferReceipt, TransferRequest, TxId, Wallet, WalletId,
    },
    Error, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transfer engine
///
/// The sole writer path to wallet balances and the ledger.
pub struct TransferEngine {
    storage: Arc<Storage>,
    locks: Arc<WalletLocks>,
    metrics: Metrics,
}

impl TransferEngine {
    /// Create engine over storage and a shared lock table
    pub fn new(storage: Arc<Storage>, locks: Arc<WalletLocks>, metrics: Metrics) -> Self {
        Self {
            storage,
            locks,
            metrics,
        }
    }

    /// Validate and atomically apply a single transfer
    ///
    /// `deadline` bounds the wait for the wallets' exclusive sections;
    /// on expiry the operation aborts with [`Error::DeadlineExceeded`]
    /// before any mutation.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        deadline: Option<Duration>,
    ) -> Result<TransferReceipt> {
        let started = Instant::now();
        let result = self.transfer_inner(request, deadline).await;

        match &result {
            Ok(receipt) => {
                self.metrics
                    .record_transfer(started.elapsed().as_secs_f64());
                tracing::info!(
                    tx = %receipt.transaction.id,
                    from = %request.from,
                    to = %request.to,
                    amount = request.amount,
                    tx_type = %receipt.transaction.tx_type,
                    requested_by = %request.requested_by,
                    "Transfer committed"
                );
            }
            Err(err) => {
                self.metrics.record_rejection();
                tracing::debug!(
                    from = %request.from,
                    to = %request.to,
                    amount = request.amount,
                    requested_by = %request.requested_by,
                    error = %err,
                    "Transfer rejected"
                );
            }
        }

        result
    }

    async fn transfer_inner(
        &self,
        request: &TransferRequest,
        deadline: Option<Duration>,
    ) -> Result<TransferReceipt> {
        if request.amount <= 0 {
            return Err(Error::InvalidAmount(request.amount));
        }

        let mut guards = self
            .acquire_locks(&[request.from, request.to], deadline)
            .await?;

        let receipt = if request.from == request.to {
            self.apply_issuance(request, &guards)?
        } else {
            self.apply_movement(request, &guards)?
        };

        record_commit(&mut guards, receipt.transaction.created_at_ms);
        Ok(receipt)
    }

    /// Issuance: self-transfer on a system wallet, creates new supply
    ///
    /// No balance sufficiency check. Issuance authority is resolved
    /// before the wallet preconditions, so a non-system self-transfer
    /// always reports `UnauthorizedIssuance` whatever state the wallet
    /// is in. The frozen check stays although system wallets can never
    /// be frozen.
    fn apply_issuance(
        &self,
        request: &TransferRequest,
        guards: &[tokio::sync::OwnedMutexGuard<crate::locks::WalletGate>],
    ) -> Result<TransferReceipt> {
        let mut wallet = self
            .storage
            .get_wallet(request.from)?
            .ok_or(Error::WalletNotFound(request.from))?;

        if self.storage.resolve_owner_class(request.from)? != OwnerClass::System {
            return Err(Error::UnauthorizedIssuance(request.from));
        }

        if wallet.frozen {
            return Err(Error::WalletFrozen(request.from));
        }

        wallet.credit(request.amount)?;

        let created_at_ms = commit_timestamp_ms(guards);
        let transaction = Transaction {
            id: request.id,
            from: request.from,
            to: request.to,
            amount: request.amount,
            tx_type: TransferKind::Issuance.tx_type(),
            created_at_ms,
        };

        self.storage
            .commit_transfers(std::slice::from_ref(&transaction), &[wallet.clone()])?;
        self.metrics.record_issuance(request.amount);

        Ok(TransferReceipt {
            transaction,
            from_balance: wallet.balance,
            to_balance: wallet.balance,
        })
    }

    /// Non-issuance transfer: distribution, pool, or normal
    ///
    /// Precondition chain, failing fast on the first violation:
    /// sender exists, sender not frozen, recipient exists, recipient
    /// not frozen, sender balance sufficient.
    fn apply_movement(
        &self,
        request: &TransferRequest,
        guards: &[tokio::sync::OwnedMutexGuard<crate::locks::WalletGate>],
    ) -> Result<TransferReceipt> {
        let mut from_wallet = self
            .storage
            .get_wallet(request.from)?
            .ok_or(Error::WalletNotFound(request.from))?;
        if from_wallet.frozen {
            return Err(Error::WalletFrozen(request.from));
        }

        let mut to_wallet = self
            .storage
            .get_wallet(request.to)?
            .ok_or(Error::WalletNotFound(request.to))?;
        if to_wallet.frozen {
            return Err(Error::WalletFrozen(request.to));
        }

        if from_wallet.balance < request.amount {
            return Err(Error::InsufficientBalance {
                wallet: request.from,
                has: from_wallet.balance,
                needs: request.amount,
            });
        }

        let kind = self.classify(request.from, request.to)?;

        from_wallet.debit(request.amount)?;
        to_wallet.credit(request.amount)?;

        let created_at_ms = commit_timestamp_ms(guards);
        let transaction = Transaction {
            id: request.id,
            from: request.from,
            to: request.to,
            amount: request.amount,
            tx_type: kind.tx_type(),
            created_at_ms,
        };

        self.storage.commit_transfers(
            std::slice::from_ref(&transaction),
            &[from_wallet.clone(), to_wallet.clone()],
        )?;

        Ok(TransferReceipt {
            transaction,
            from_balance: from_wallet.balance,
            to_balance: to_wallet.balance,
        })
    }

    /// Classify a non-issuance wallet pair
    ///
    /// The label is informational; validation is identical for all
    /// three kinds.
    fn classify(&self, from: WalletId, to: WalletId) -> Result<TransferKind> {
        let from_class = self.storage.resolve_owner_class(from)?;
        let to_class = self.storage.resolve_owner_class(to)?;

        Ok(match (from_class, to_class) {
            (OwnerClass::System, OwnerClass::User) => TransferKind::Distribution,
            (OwnerClass::User, OwnerClass::System) => TransferKind::Pool,
            _ => TransferKind::Normal,
        })
    }

    /// Atomically distribute a batch from one system wallet,
    /// auto-issuing any shortfall first
    ///
    /// The issuance, every line, and all balance mutations commit in
    /// one storage batch; any line failure rolls the whole batch back
    /// with [`Error::BatchPartialFailure`] naming the offending line.
    /// This is the only place auto-issuance is triggered.
    pub async fn distribute(
        &self,
        source: WalletId,
        lines: &[DistributionLine],
        deadline: Option<Duration>,
    ) -> Result<DistributionReceipt> {
        if lines.is_empty() {
            return Err(Error::InvariantViolation(
                "distribution batch has no lines".to_string(),
            ));
        }

        let mut lock_set: Vec<WalletId> = Vec::with_capacity(lines.len() + 1);
        lock_set.push(source);
        lock_set.extend(lines.iter().map(|line| line.recipient));

        let mut guards = self.acquire_locks(&lock_set, deadline).await?;

        let source_wallet = self
            .storage
            .get_wallet(source)?
            .ok_or(Error::WalletNotFound(source))?;
        if source_wallet.frozen {
            return Err(Error::WalletFrozen(source));
        }
        if self.storage.resolve_owner_class(source)? != OwnerClass::System {
            return Err(Error::UnauthorizedIssuance(source));
        }

        let mut total_requested: i64 = 0;
        for (line_no, line) in lines.iter().enumerate() {
            if line.amount <= 0 {
                return Err(Error::BatchPartialFailure {
                    line: line_no,
                    source: Box::new(Error::InvalidAmount(line.amount)),
                });
            }
            total_requested = total_requested.checked_add(line.amount).ok_or_else(|| {
                Error::InvariantViolation("distribution batch total overflows i64".to_string())
            })?;
        }

        let created_at_ms = commit_timestamp_ms(&guards);

        // Working set: all balance effects accumulate here and commit
        // at once, or not at all
        let mut working: HashMap<WalletId, Wallet> = HashMap::new();
        working.insert(source, source_wallet.clone());

        let mut transactions = Vec::with_capacity(lines.len() + 1);

        // Auto-issue exactly the shortfall
        let shortfall = total_requested - source_wallet.balance;
        if shortfall > 0 {
            working
                .get_mut(&source)
                .expect("source is in the working set")
                .credit(shortfall)?;
            transactions.push(Transaction {
                id: TxId::new(),
                from: source,
                to: source,
                amount: shortfall,
                tx_type: TransferKind::Issuance.tx_type(),
                created_at_ms,
            });
        }

        for (line_no, line) in lines.iter().enumerate() {
            self.apply_line(source, line, created_at_ms, &mut working, &mut transactions)
                .map_err(|err| Error::BatchPartialFailure {
                    line: line_no,
                    source: Box::new(err),
                })?;
        }

        let wallets: Vec<Wallet> = working.values().cloned().collect();
        self.storage.commit_transfers(&transactions, &wallets)?;

        record_commit(&mut guards, created_at_ms);

        let source_balance = working
            .get(&source)
            .expect("source is in the working set")
            .balance;

        if shortfall > 0 {
            self.metrics.record_issuance(shortfall);
        }
        self.metrics.record_distribution_batch(lines.len());
        tracing::info!(
            source = %source,
            lines = lines.len(),
            total = total_requested,
            issued = shortfall.max(0),
            "Distribution batch committed"
        );

        Ok(DistributionReceipt {
            transactions,
            source_balance,
        })
    }

    /// Validate and stage one distribution line against the working set
    fn apply_line(
        &self,
        source: WalletId,
        line: &DistributionLine,
        created_at_ms: i64,
        working: &mut HashMap<WalletId, Wallet>,
        transactions: &mut Vec<Transaction>,
    ) -> Result<()> {
        if line.recipient == source {
            return Err(Error::InvariantViolation(
                "distribution line targets the source wallet".to_string(),
            ));
        }

        if !working.contains_key(&line.recipient) {
            let wallet = self
                .storage
                .get_wallet(line.recipient)?
                .ok_or(Error::WalletNotFound(line.recipient))?;
            working.insert(line.recipient, wallet);
        }

        let recipient = working
            .get(&line.recipient)
            .expect("inserted above");
        if recipient.frozen {
            return Err(Error::WalletFrozen(line.recipient));
        }

        let source_wallet = working.get(&source).expect("source is in the working set");
        if source_wallet.balance < line.amount {
            return Err(Error::InsufficientBalance {
                wallet: source,
                has: source_wallet.balance,
                needs: line.amount,
            });
        }

        // Distribution when the recipient is user-owned; a transfer
        // into another system wallet is a plain transfer
        let kind = match self.storage.resolve_owner_class(line.recipient)? {
            OwnerClass::User => TransferKind::Distribution,
            _ => TransferKind::Normal,
        };

        working
            .get_mut(&source)
            .expect("source is in the working set")
            .debit(line.amount)?;
        working
            .get_mut(&line.recipient)
            .expect("inserted above")
            .credit(line.amount)?;

        transactions.push(Transaction {
            id: TxId::new(),
            from: source,
            to: line.recipient,
            amount: line.amount,
            tx_type: kind.tx_type(),
            created_at_ms,
        });

        Ok(())
    }

    async fn acquire_locks(
        &self,
        ids: &[WalletId],
        deadline: Option<Duration>,
    ) -> Result<Vec<tokio::sync::OwnedMutexGuard<crate::locks::WalletGate>>> {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.locks.acquire(ids))
                .await
                .map_err(|_| Error::DeadlineExceeded),
            None => Ok(self.locks.acquire(ids).await),
        }
    }
}
