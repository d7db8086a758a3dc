//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_transfers_total` - Total transfers committed
//! - `ledger_transfers_rejected_total` - Total transfers rejected
//! - `ledger_issuance_amount_total` - Total tokens issued
//! - `ledger_distribution_batch_size` - Histogram of distribution batch sizes
//! - `ledger_transfer_duration_seconds` - Histogram of transfer latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Collectors register into a per-instance registry, not the process
/// default, so multiple ledgers can coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Total transfers committed
    pub transfers_total: IntCounter,

    /// Total transfers rejected
    pub transfers_rejected_total: IntCounter,

    /// Total tokens issued
    pub issuance_amount_total: IntCounter,

    /// Distribution batch size histogram
    pub distribution_batch_size: Histogram,

    /// Transfer duration histogram
    pub transfer_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total =
            IntCounter::new("ledger_transfers_total", "Total transfers committed")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let transfers_rejected_total = IntCounter::new(
            "ledger_transfers_rejected_total",
            "Total transfers rejected",
        )?;
        registry.register(Box::new(transfers_rejected_total.clone()))?;

        let issuance_amount_total =
            IntCounter::new("ledger_issuance_amount_total", "Total tokens issued")?;
        registry.register(Box::new(issuance_amount_total.clone()))?;

        let distribution_batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_distribution_batch_size",
                "Histogram of distribution batch sizes",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(distribution_batch_size.clone()))?;

        let transfer_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_transfer_duration_seconds",
                "Histogram of transfer latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(transfer_duration.clone()))?;

        Ok(Self {
            transfers_total,
            transfers_rejected_total,
            issuance_amount_total,
            distribution_batch_size,
            transfer_duration,
            registry,
        })
    }

    /// Record a committed transfer
    pub fn record_transfer(&self, duration_seconds: f64) {
        self.transfers_total.inc();
        self.transfer_duration.observe(duration_seconds);
    }

    /// Record a rejected transfer
    pub fn record_rejection(&self) {
        self.transfers_rejected_total.inc();
    }

    /// Record issued tokens
    pub fn record_issuance(&self, amount: i64) {
        self.issuance_amount_total.inc_by(amount.max(0) as u64);
    }

    /// Record a committed distribution batch
    pub fn record_distribution_batch(&self, lines: usize) {
        self.distribution_batch_size.observe(lines as f64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transfers_total.get(), 0);
        assert_eq!(metrics.transfers_rejected_total.get(), 0);
    }

    #[test]
    fn test_record_transfer() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transfer(0.002);
        metrics.record_transfer(0.004);
        assert_eq!(metrics.transfers_total.get(), 2);
    }

    #[test]
    fn test_record_issuance() {
        let metrics = Metrics::new().unwrap();
        metrics.record_issuance(300);
        metrics.record_issuance(200);
        assert_eq!(metrics.issuance_amount_total.get(), 500);
    }

    #[test]
    fn test_record_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection();
        assert_eq!(metrics.transfers_rejected_total.get(), 1);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_transfer(0.001);
        assert_eq!(a.transfers_total.get(), 1);
        assert_eq!(b.transfers_total.get(), 0);
    }
}
