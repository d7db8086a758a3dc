//! Per-wallet exclusive sections
//!
//! Every balance mutation runs inside an exclusive section for the
//! wallets it touches. Operations on disjoint wallet sets proceed in
//! parallel; two operations contending for the same wallet serialize,
//! which is what makes the sufficiency check race-free.
//!
//! Deadlock avoidance: lock sets are sorted by `WalletId`'s total
//! order (lexicographic over UUID bytes) and deduplicated before
//! acquisition, so two transfers targeting each other's wallets in
//! opposite directions can never circular-wait.

use crate::types::WalletId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-wallet state guarded by the lock
#[derive(Debug)]
pub struct WalletGate {
    /// Commit timestamp of the last transfer touching this wallet.
    /// Used to keep `created_at_ms` monotone with commit order per
    /// wallet even under clock skew.
    pub last_commit_ms: i64,
}

/// Lock table mapping wallet identity to its exclusive section
///
/// Entries are created on first touch and kept for the process
/// lifetime; the table is bounded by the wallet population.
pub struct WalletLocks {
    table: DashMap<WalletId, Arc<Mutex<WalletGate>>>,
}

impl WalletLocks {
    /// New empty lock table
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    fn gate(&self, id: WalletId) -> Arc<Mutex<WalletGate>> {
        self.table
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(WalletGate { last_commit_ms: 0 })))
            .clone()
    }

    /// Acquire exclusive access to every wallet in the set
    ///
    /// The set is sorted and deduplicated internally; callers may pass
    /// wallets in any order. Guards release on drop, so an aborted
    /// operation never leaves a wallet locked.
    pub async fn acquire(&self, ids: &[WalletId]) -> Vec<OwnedMutexGuard<WalletGate>> {
        let mut sorted: Vec<WalletId> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            let gate = self.gate(id);
            guards.push(gate.lock_owned().await);
        }
        guards
    }
}

impl Default for WalletLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Commit timestamp for a transfer, strictly increasing per wallet
///
/// Takes the wall clock, clamped to strictly exceed the last commit
/// observed on any wallet in the lock set. Two commits on the same
/// wallet within one millisecond therefore still order by timestamp.
pub fn commit_timestamp_ms(guards: &[OwnedMutexGuard<WalletGate>]) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let floor = guards
        .iter()
        .map(|g| g.last_commit_ms)
        .max()
        .unwrap_or(0);
    now.max(floor + 1)
}

/// Record a commit timestamp on every wallet in the lock set
pub fn record_commit(guards: &mut [OwnedMutexGuard<WalletGate>], ts: i64) {
    for guard in guards.iter_mut() {
        guard.last_commit_ms = ts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_dedups() {
        let locks = WalletLocks::new();
        let a = WalletId::new();

        // Same wallet twice must not self-deadlock
        let guards = locks.acquire(&[a, a]).await;
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn test_contended_wallet_serializes() {
        let locks = Arc::new(WalletLocks::new());
        let wallet = WalletId::new();
        let in_section = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            handles.push(tokio::spawn(async move {
                let _guards = locks.acquire(&[wallet]).await;
                let active = in_section.fetch_add(1, Ordering::SeqCst);
                assert_eq!(active, 0, "two tasks inside one wallet's section");
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_direction_pairs_no_deadlock() {
        let locks = Arc::new(WalletLocks::new());
        let a = WalletId::new();
        let b = WalletId::new();

        let mut handles = Vec::new();
        for i in 0..50 {
            let locks = locks.clone();
            // Half the tasks lock (a, b), half (b, a)
            let pair = if i % 2 == 0 { [a, b] } else { [b, a] };
            handles.push(tokio::spawn(async move {
                let _guards = locks.acquire(&pair).await;
                tokio::task::yield_now().await;
            }));
        }

        let joined = tokio::time::timeout(Duration::from_secs(5), async {
            for handle in handles {
                handle.await.unwrap();
            }
        })
        .await;
        assert!(joined.is_ok(), "lock ordering failed to prevent deadlock");
    }

    #[tokio::test]
    async fn test_commit_timestamp_monotone() {
        let locks = WalletLocks::new();
        let a = WalletId::new();

        let mut guards = locks.acquire(&[a]).await;
        let far_future = chrono::Utc::now().timestamp_millis() + 60_000;
        record_commit(&mut guards, far_future);
        drop(guards);

        // A wall clock behind the last commit must not produce a
        // timestamp that runs backwards
        let guards = locks.acquire(&[a]).await;
        assert!(commit_timestamp_ms(&guards) >= far_future);
    }
}
