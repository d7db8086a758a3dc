//! Core types for the token ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (integer token amounts, no floats)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wallet identifier (opaque, caller-generated)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Create a fresh wallet ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Raw bytes (storage keys, lock ordering)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier (unique, caller-generated)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TxId(Uuid);

impl TxId {
    /// Create a fresh transaction ID (UUIDv7 for time-ordering)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Raw bytes (storage keys)
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet record
///
/// Invariant: `balance >= 0` at all times. Mutated only by the
/// transfer engine, as a side effect of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet identity
    pub id: WalletId,

    /// Current balance (non-negative)
    pub balance: i64,

    /// Frozen flag: rejects all sends and receives
    pub frozen: bool,
}

impl Wallet {
    /// New empty wallet
    pub fn new(id: WalletId) -> Self {
        Self {
            id,
            balance: 0,
            frozen: false,
        }
    }

    /// Credit `amount` tokens, checked against i64 overflow
    pub fn credit(&mut self, amount: i64) -> crate::Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            crate::Error::InvariantViolation(format!(
                "balance overflow crediting {} to wallet {}",
                amount, self.id
            ))
        })?;
        Ok(())
    }

    /// Debit `amount` tokens
    ///
    /// Callers must have verified sufficiency first; a debit below
    /// zero is an invariant violation, not a user error.
    pub fn debit(&mut self, amount: i64) -> crate::Result<()> {
        let next = self.balance - amount;
        if next < 0 {
            return Err(crate::Error::InvariantViolation(format!(
                "debit of {} would take wallet {} below zero",
                amount, self.id
            )));
        }
        self.balance = next;
        Ok(())
    }
}

/// Wallet owner: user or system account
///
/// Two disjoint variants of one capability ("may hold exactly one
/// wallet"), resolved in a single call rather than two table scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    /// System account: immutable name, issuance authority, no delete path
    System {
        /// Unique account name
        name: String,
    },
    /// End user: mutable display name, soft-deletable
    User {
        /// Display name
        display_name: String,
        /// Soft-delete marker (None = active)
        deleted_at: Option<DateTime<Utc>>,
    },
}

impl Owner {
    /// Owner class for policy decisions
    pub fn class(&self) -> OwnerClass {
        match self {
            Owner::System { .. } => OwnerClass::System,
            Owner::User { .. } => OwnerClass::User,
        }
    }

    /// Active owners may be referenced by new operations
    pub fn is_active(&self) -> bool {
        match self {
            Owner::System { .. } => true,
            Owner::User { deleted_at, .. } => deleted_at.is_none(),
        }
    }
}

/// Resolved owner class of a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerClass {
    /// System-owned (issuance authority)
    System,
    /// User-owned
    User,
    /// No owner record found
    Unknown,
}

/// Transaction type code
///
/// Reserved range 1..=99. Zero is forbidden as a sentinel-for-bug
/// guard: a zeroed struct must never deserialize into a valid type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxType(u8);

impl TxType {
    /// Issuance (self-transfer on a system wallet)
    pub const ISSUANCE: TxType = TxType(1);
    /// Distribution (system wallet to user wallet)
    pub const DISTRIBUTION: TxType = TxType(2);
    /// Normal transfer
    pub const TRANSFER: TxType = TxType(3);
    /// Pool transfer (user wallet to system wallet)
    pub const POOL: TxType = TxType(4);

    /// Validate a raw code into the reserved range
    pub fn new(code: u8) -> crate::Result<Self> {
        if code == 0 || code > 99 {
            return Err(crate::Error::InvariantViolation(format!(
                "transaction type code {} outside reserved range 1..=99",
                code
            )));
        }
        Ok(TxType(code))
    }

    /// Raw code
    pub fn code(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfer classification (evaluated issuance first, then distribution)
///
/// Normal vs. pool is an informational label; validation is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Self-transfer on a system wallet: creates new supply
    Issuance,
    /// System wallet to user wallet
    Distribution,
    /// Any other pair
    Normal,
    /// User wallet to system wallet (fees/charges)
    Pool,
}

impl TransferKind {
    /// Transaction type code for this classification
    pub fn tx_type(&self) -> TxType {
        match self {
            TransferKind::Issuance => TxType::ISSUANCE,
            TransferKind::Distribution => TxType::DISTRIBUTION,
            TransferKind::Normal => TxType::TRANSFER,
            TransferKind::Pool => TxType::POOL,
        }
    }
}

/// Ledger transaction record
///
/// Immutable once persisted: the permanent source of truth for supply
/// and history. `from == to` denotes issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: TxId,

    /// Sender wallet
    pub from: WalletId,

    /// Recipient wallet
    pub to: WalletId,

    /// Token amount (positive)
    pub amount: i64,

    /// Transaction type code
    pub tx_type: TxType,

    /// Commit timestamp (milliseconds since Unix epoch)
    pub created_at_ms: i64,
}

impl Transaction {
    /// Issuance transactions create new supply
    pub fn is_issuance(&self) -> bool {
        self.from == self.to
    }
}

/// A requested transfer, before validation
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Caller-generated transaction ID
    pub id: TxId,

    /// Sender wallet
    pub from: WalletId,

    /// Recipient wallet
    pub to: WalletId,

    /// Token amount
    pub amount: i64,

    /// Pre-validated caller identity (logged, not persisted)
    pub requested_by: String,
}

impl TransferRequest {
    /// New request with a fresh transaction ID
    pub fn new(
        from: WalletId,
        to: WalletId,
        amount: i64,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            id: TxId::new(),
            from,
            to,
            amount,
            requested_by: requested_by.into(),
        }
    }
}

/// Result of a committed transfer
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// The committed transaction
    pub transaction: Transaction,

    /// Post-transfer sender balance
    pub from_balance: i64,

    /// Post-transfer recipient balance
    pub to_balance: i64,
}

/// One line of a distribution batch
#[derive(Debug, Clone, Copy)]
pub struct DistributionLine {
    /// Recipient wallet
    pub recipient: WalletId,

    /// Token amount (positive)
    pub amount: i64,
}

/// Result of a committed distribution batch
#[derive(Debug, Clone)]
pub struct DistributionReceipt {
    /// Committed transactions: the auto-issuance first (if any),
    /// then one per batch line in order
    pub transactions: Vec<Transaction>,

    /// Final source wallet balance
    pub source_balance: i64,
}

impl DistributionReceipt {
    /// Amount auto-issued to cover the batch shortfall (0 if none)
    pub fn issued_amount(&self) -> i64 {
        self.transactions
            .first()
            .filter(|tx| tx.is_issuance())
            .map(|tx| tx.amount)
            .unwrap_or(0)
    }
}

/// Supply metrics derived from balances and issuance history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyStats {
    /// Sum of all issuance transaction amounts
    pub total_issuance: i64,

    /// Sum of balances held in user-owned wallets
    pub circulating: i64,

    /// Sum of balances held in system-owned wallets
    pub system_pool: i64,
}

/// Conservation check: total issuance vs. total balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Sum of issuance transaction amounts
    pub total_issuance: i64,

    /// Sum of all wallet balances
    pub total_balances: i64,
}

impl ConservationReport {
    /// True when issuance equals circulating supply plus system pool
    pub fn holds(&self) -> bool {
        self.total_issuance == self.total_balances
    }
}

/// History query filters
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    /// Only transactions committed at or after this timestamp
    pub after_ms: Option<i64>,

    /// Only transactions committed strictly before this timestamp
    pub before_ms: Option<i64>,

    /// Only transactions of this type
    pub tx_type: Option<TxType>,
}

impl HistoryFilter {
    /// True when the transaction passes every set filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(after) = self.after_ms {
            if tx.created_at_ms < after {
                return false;
            }
        }
        if let Some(before) = self.before_ms {
            if tx.created_at_ms >= before {
                return false;
            }
        }
        if let Some(ty) = self.tx_type {
            if tx.tx_type != ty {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_type_reserved_range() {
        assert!(TxType::new(0).is_err());
        assert!(TxType::new(100).is_err());
        assert_eq!(TxType::new(1).unwrap(), TxType::ISSUANCE);
        assert_eq!(TxType::new(99).unwrap().code(), 99);
    }

    #[test]
    fn test_wallet_credit_debit() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.credit(100).unwrap();
        assert_eq!(wallet.balance, 100);

        wallet.debit(60).unwrap();
        assert_eq!(wallet.balance, 40);

        // Debit below zero is an invariant violation
        assert!(wallet.debit(41).is_err());
        assert_eq!(wallet.balance, 40);
    }

    #[test]
    fn test_wallet_credit_overflow() {
        let mut wallet = Wallet::new(WalletId::new());
        wallet.credit(i64::MAX).unwrap();
        assert!(wallet.credit(1).is_err());
    }

    #[test]
    fn test_owner_class_and_activity() {
        let system = Owner::System {
            name: "treasury".to_string(),
        };
        assert_eq!(system.class(), OwnerClass::System);
        assert!(system.is_active());

        let user = Owner::User {
            display_name: "alice".to_string(),
            deleted_at: None,
        };
        assert_eq!(user.class(), OwnerClass::User);
        assert!(user.is_active());

        let deleted = Owner::User {
            display_name: "bob".to_string(),
            deleted_at: Some(Utc::now()),
        };
        assert!(!deleted.is_active());
    }

    #[test]
    fn test_history_filter() {
        let tx = Transaction {
            id: TxId::new(),
            from: WalletId::new(),
            to: WalletId::new(),
            amount: 10,
            tx_type: TxType::TRANSFER,
            created_at_ms: 1_000,
        };

        assert!(HistoryFilter::default().matches(&tx));
        assert!(HistoryFilter {
            after_ms: Some(1_000),
            ..Default::default()
        }
        .matches(&tx));
        assert!(!HistoryFilter {
            before_ms: Some(1_000),
            ..Default::default()
        }
        .matches(&tx));
        assert!(!HistoryFilter {
            tx_type: Some(TxType::ISSUANCE),
            ..Default::default()
        }
        .matches(&tx));
    }

    #[test]
    fn test_transfer_kind_codes() {
        assert_eq!(TransferKind::Issuance.tx_type(), TxType::ISSUANCE);
        assert_eq!(TransferKind::Distribution.tx_type(), TxType::DISTRIBUTION);
        assert_eq!(TransferKind::Normal.tx_type(), TxType::TRANSFER);
        assert_eq!(TransferKind::Pool.tx_type(), TxType::POOL);
    }
}
