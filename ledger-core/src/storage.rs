//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - Wallet records (key: wallet_id)
//! - `owners` - Owner records, one per wallet (key: wallet_id)
//! - `transactions` - Append-only ledger (key: tx_id)
//! - `history` - Per-wallet time index (key: wallet_id || created_at_ms || tx_id)
//! - `issuance` - Issuance index for supply queries (key: created_at_ms || tx_id)
//!
//! The ledger column family is append-only: `commit_transfers` rejects
//! any write under an existing transaction ID, and no update or delete
//! path exists. This is the storage-level backstop for transaction
//! immutability.

use crate::{
    error::{Error, Result},
    types::{Owner, OwnerClass, Transaction, TxId, Wallet, WalletId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_OWNERS: &str = "owners";
const CF_TRANSACTIONS: &str = "transactions";
const CF_HISTORY: &str = "history";
const CF_ISSUANCE: &str = "issuance";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_OWNERS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_HISTORY, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_ISSUANCE, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB with 5 column families");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Wallets and owners are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::StorageUnavailable(format!("Column family {} not found", name)))
    }

    // Provisioning operations

    /// Create a wallet together with its owner record (atomic)
    ///
    /// Rejects re-provisioning an existing wallet: the owner/wallet
    /// relation is 1:1 and created exactly once.
    pub fn create_wallet(&self, wallet_id: WalletId, owner: &Owner) -> Result<()> {
        if self.get_wallet(wallet_id)?.is_some() {
            return Err(Error::InvariantViolation(format!(
                "wallet {} already provisioned",
                wallet_id
            )));
        }

        let wallet = Wallet::new(wallet_id);
        let mut batch = WriteBatch::default();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(cf_wallets, wallet_id.as_bytes(), bincode::serialize(&wallet)?);

        let cf_owners = self.cf_handle(CF_OWNERS)?;
        batch.put_cf(cf_owners, wallet_id.as_bytes(), bincode::serialize(owner)?);

        self.db.write(batch)?;

        tracing::debug!(wallet = %wallet_id, class = ?owner.class(), "Wallet provisioned");

        Ok(())
    }

    /// Get wallet by ID
    pub fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        match self.db.get_cf(cf, wallet_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite a wallet record (freeze administration only; balance
    /// mutations go through `commit_transfers`)
    pub fn put_wallet(&self, wallet: &Wallet) -> Result<()> {
        let cf = self.cf_handle(CF_WALLETS)?;
        self.db
            .put_cf(cf, wallet.id.as_bytes(), bincode::serialize(wallet)?)?;
        Ok(())
    }

    /// Get owner record for a wallet
    pub fn get_owner(&self, wallet_id: WalletId) -> Result<Option<Owner>> {
        let cf = self.cf_handle(CF_OWNERS)?;
        match self.db.get_cf(cf, wallet_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite an owner record (rename, soft delete)
    pub fn put_owner(&self, wallet_id: WalletId, owner: &Owner) -> Result<()> {
        let cf = self.cf_handle(CF_OWNERS)?;
        self.db
            .put_cf(cf, wallet_id.as_bytes(), bincode::serialize(owner)?)?;
        Ok(())
    }

    /// Resolve a wallet's owner class in a single call
    pub fn resolve_owner_class(&self, wallet_id: WalletId) -> Result<OwnerClass> {
        Ok(self
            .get_owner(wallet_id)?
            .map(|owner| owner.class())
            .unwrap_or(OwnerClass::Unknown))
    }

    // Ledger operations

    /// Commit transactions and wallet mutations as one atomic unit
    ///
    /// This is the multi-row transactional boundary the transfer
    /// engine relies on: every ledger append, history/issuance index
    /// row, and wallet mutation lands in a single `WriteBatch`.
    /// Appending under an existing transaction ID fails the whole
    /// batch before anything is written.
    pub fn commit_transfers(&self, transactions: &[Transaction], wallets: &[Wallet]) -> Result<()> {
        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_history = self.cf_handle(CF_HISTORY)?;
        let cf_issuance = self.cf_handle(CF_ISSUANCE)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;

        let mut batch = WriteBatch::default();

        for tx in transactions {
            // Append-only backstop
            if self.db.get_pinned_cf(cf_txs, tx.id.as_bytes())?.is_some() {
                return Err(Error::TransactionExists(tx.id));
            }

            batch.put_cf(cf_txs, tx.id.as_bytes(), bincode::serialize(tx)?);

            // Per-wallet history rows: one for each side, one total for issuance
            batch.put_cf(
                cf_history,
                Self::history_key(tx.from, tx.created_at_ms, tx.id),
                [tx.tx_type.code()],
            );
            if tx.to != tx.from {
                batch.put_cf(
                    cf_history,
                    Self::history_key(tx.to, tx.created_at_ms, tx.id),
                    [tx.tx_type.code()],
                );
            }

            if tx.is_issuance() {
                batch.put_cf(
                    cf_issuance,
                    Self::issuance_key(tx.created_at_ms, tx.id),
                    tx.amount.to_be_bytes(),
                );
            }
        }

        for wallet in wallets {
            batch.put_cf(cf_wallets, wallet.id.as_bytes(), bincode::serialize(wallet)?);
        }

        self.db.write(batch)?;

        tracing::debug!(
            transactions = transactions.len(),
            wallets = wallets.len(),
            "Atomic commit"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, tx_id: TxId) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, tx_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Transaction IDs touching a wallet, newest first
    pub fn history_tx_ids(&self, wallet_id: WalletId) -> Result<Vec<TxId>> {
        let cf = self.cf_handle(CF_HISTORY)?;

        let prefix = wallet_id.as_bytes();

        // Seek to the end of the wallet's key range, walk backwards
        let mut upper = prefix.to_vec();
        upper.extend_from_slice(&[0xff; 24]);

        let mut ids = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse));

        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            // Key layout: wallet_id(16) || created_at_ms(8) || tx_id(16)
            if key.len() == 40 {
                let tx_id_bytes: [u8; 16] = key[24..40].try_into().map_err(|_| {
                    Error::StorageUnavailable("corrupt history index key".to_string())
                })?;
                ids.push(TxId::from_uuid(uuid::Uuid::from_bytes(tx_id_bytes)));
            }
        }

        Ok(ids)
    }

    /// Point-in-time supply scan: total issuance plus every wallet
    /// with its owner class
    ///
    /// All reads (issuance index, wallet balances, owner records) run
    /// against a single RocksDB snapshot, so a transfer committing
    /// while the scan is in flight is observed either fully or not at
    /// all. Two live scans would let an issuance land between them and
    /// show up in the balances but not in the issuance total.
    pub fn supply_scan(&self) -> Result<(i64, Vec<(Wallet, OwnerClass)>)> {
        let cf_issuance = self.cf_handle(CF_ISSUANCE)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_owners = self.cf_handle(CF_OWNERS)?;

        let snapshot = self.db.snapshot();

        let mut total_issuance: i64 = 0;
        for item in snapshot.iterator_cf(cf_issuance, IteratorMode::Start) {
            let (_, value) = item?;
            let amount_bytes: [u8; 8] = value.as_ref().try_into().map_err(|_| {
                Error::StorageUnavailable("corrupt issuance index value".to_string())
            })?;
            let amount = i64::from_be_bytes(amount_bytes);
            total_issuance = total_issuance.checked_add(amount).ok_or_else(|| {
                Error::InvariantViolation("total issuance overflows i64".to_string())
            })?;
        }

        let mut wallets = Vec::new();
        for item in snapshot.iterator_cf(cf_wallets, IteratorMode::Start) {
            let (key, value) = item?;
            let wallet: Wallet = bincode::deserialize(&value)?;
            let class = match snapshot.get_cf(cf_owners, &*key)? {
                Some(raw) => bincode::deserialize::<Owner>(&raw)?.class(),
                None => OwnerClass::Unknown,
            };
            wallets.push((wallet, class));
        }

        Ok((total_issuance, wallets))
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;

        Ok(StorageStats {
            total_transactions: self.approximate_count(cf_txs)?,
            total_wallets: self.approximate_count(cf_wallets)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }

    // Index key helpers

    fn history_key(wallet_id: WalletId, created_at_ms: i64, tx_id: TxId) -> Vec<u8> {
        let mut key = wallet_id.as_bytes().to_vec();
        key.extend_from_slice(&created_at_ms.to_be_bytes());
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    fn issuance_key(created_at_ms: i64, tx_id: TxId) -> Vec<u8> {
        let mut key = created_at_ms.to_be_bytes().to_vec();
        key.extend_from_slice(tx_id.as_bytes());
        key
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate committed transaction count
    pub total_transactions: u64,

    /// Approximate wallet count
    pub total_wallets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxType;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn user_owner(name: &str) -> Owner {
        Owner::User {
            display_name: name.to_string(),
            deleted_at: None,
        }
    }

    fn tx(from: WalletId, to: WalletId, amount: i64, created_at_ms: i64) -> Transaction {
        Transaction {
            id: TxId::new(),
            from,
            to,
            amount,
            tx_type: if from == to {
                TxType::ISSUANCE
            } else {
                TxType::TRANSFER
            },
            created_at_ms,
        }
    }

    #[test]
    fn test_provision_and_resolve() {
        let (storage, _temp) = test_storage();

        let user_wallet = WalletId::new();
        let system_wallet = WalletId::new();

        storage.create_wallet(user_wallet, &user_owner("alice")).unwrap();
        storage
            .create_wallet(
                system_wallet,
                &Owner::System {
                    name: "treasury".to_string(),
                },
            )
            .unwrap();

        assert_eq!(
            storage.resolve_owner_class(user_wallet).unwrap(),
            OwnerClass::User
        );
        assert_eq!(
            storage.resolve_owner_class(system_wallet).unwrap(),
            OwnerClass::System
        );
        assert_eq!(
            storage.resolve_owner_class(WalletId::new()).unwrap(),
            OwnerClass::Unknown
        );

        let wallet = storage.get_wallet(user_wallet).unwrap().unwrap();
        assert_eq!(wallet.balance, 0);
        assert!(!wallet.frozen);
    }

    #[test]
    fn test_reprovision_rejected() {
        let (storage, _temp) = test_storage();

        let wallet = WalletId::new();
        storage.create_wallet(wallet, &user_owner("alice")).unwrap();
        assert!(storage.create_wallet(wallet, &user_owner("alice")).is_err());
    }

    #[test]
    fn test_atomic_commit_and_readback() {
        let (storage, _temp) = test_storage();

        let a = WalletId::new();
        let b = WalletId::new();
        storage.create_wallet(a, &user_owner("alice")).unwrap();
        storage.create_wallet(b, &user_owner("bob")).unwrap();

        let transfer = tx(a, b, 40, 1_000);
        let mut wallet_a = storage.get_wallet(a).unwrap().unwrap();
        let mut wallet_b = storage.get_wallet(b).unwrap().unwrap();
        wallet_a.balance = 60;
        wallet_b.balance = 40;

        storage
            .commit_transfers(&[transfer.clone()], &[wallet_a, wallet_b])
            .unwrap();

        let stored = storage.get_transaction(transfer.id).unwrap().unwrap();
        assert_eq!(stored, transfer);
        assert_eq!(storage.get_wallet(a).unwrap().unwrap().balance, 60);
        assert_eq!(storage.get_wallet(b).unwrap().unwrap().balance, 40);
    }

    #[test]
    fn test_append_only_backstop() {
        let (storage, _temp) = test_storage();

        let a = WalletId::new();
        storage.create_wallet(a, &user_owner("alice")).unwrap();

        let issuance = tx(a, a, 100, 1_000);
        let mut wallet = storage.get_wallet(a).unwrap().unwrap();
        wallet.balance = 100;
        storage
            .commit_transfers(&[issuance.clone()], &[wallet.clone()])
            .unwrap();

        // Re-appending under the same ID must fail, even with a
        // mutated amount
        let mut tampered = issuance.clone();
        tampered.amount = 999_999;
        let err = storage
            .commit_transfers(&[tampered], &[wallet])
            .unwrap_err();
        assert!(matches!(err, Error::TransactionExists(id) if id == issuance.id));

        // The original record is untouched
        let stored = storage.get_transaction(issuance.id).unwrap().unwrap();
        assert_eq!(stored.amount, 100);
    }

    #[test]
    fn test_history_newest_first() {
        let (storage, _temp) = test_storage();

        let a = WalletId::new();
        let b = WalletId::new();
        storage.create_wallet(a, &user_owner("alice")).unwrap();
        storage.create_wallet(b, &user_owner("bob")).unwrap();

        let t1 = tx(a, b, 1, 1_000);
        let t2 = tx(a, b, 2, 2_000);
        let t3 = tx(b, a, 3, 3_000);

        for t in [&t1, &t2, &t3] {
            storage.commit_transfers(&[(*t).clone()], &[]).unwrap();
        }

        let ids = storage.history_tx_ids(a).unwrap();
        assert_eq!(ids, vec![t3.id, t2.id, t1.id]);

        // Both sides see the transfer
        let ids_b = storage.history_tx_ids(b).unwrap();
        assert_eq!(ids_b.len(), 3);
    }

    #[test]
    fn test_issuance_index_totals() {
        let (storage, _temp) = test_storage();

        let sys = WalletId::new();
        let user = WalletId::new();
        storage
            .create_wallet(
                sys,
                &Owner::System {
                    name: "treasury".to_string(),
                },
            )
            .unwrap();
        storage.create_wallet(user, &user_owner("alice")).unwrap();

        storage
            .commit_transfers(&[tx(sys, sys, 300, 1_000)], &[])
            .unwrap();
        storage
            .commit_transfers(&[tx(sys, sys, 200, 2_000)], &[])
            .unwrap();
        // Non-issuance transfers do not count toward supply
        storage
            .commit_transfers(&[tx(sys, user, 100, 3_000)], &[])
            .unwrap();

        let (total_issuance, wallets) = storage.supply_scan().unwrap();
        assert_eq!(total_issuance, 500);
        assert_eq!(wallets.len(), 2);
        assert!(wallets
            .iter()
            .any(|(w, class)| w.id == sys && *class == OwnerClass::System));
        assert!(wallets
            .iter()
            .any(|(w, class)| w.id == user && *class == OwnerClass::User));
    }
}
