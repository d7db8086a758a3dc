//! Batch distribution over the ledger's atomic primitive
//!
//! The orchestrator owns batch *policy*: the recipient bound, line
//! sanity checks, and the audit log line carrying the distribution
//! reason. Execution is delegated to `Ledger::distribute`, which
//! commits the auto-issuance and every line in one atomic unit.

use crate::{Config, Error, Result};
use ledger_core::{DistributionLine, DistributionReceipt, Ledger, WalletId};
use std::sync::Arc;
use std::time::Duration;

/// Distribution orchestrator
pub struct DistributionOrchestrator {
    /// Ledger (shared with every other writer in the process)
    ledger: Arc<Ledger>,

    /// Configuration
    config: Config,
}

impl DistributionOrchestrator {
    /// Create orchestrator over a shared ledger
    pub fn new(ledger: Arc<Ledger>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { ledger, config })
    }

    /// Atomically distribute a batch from a system wallet
    ///
    /// Validates batch policy, then executes all lines (plus any
    /// auto-issued shortfall) as one all-or-nothing unit. Partial
    /// application is forbidden: a failing line rolls back the whole
    /// batch, issuance included.
    pub async fn distribute(
        &self,
        source: WalletId,
        lines: &[DistributionLine],
        reason: &str,
        deadline: Option<Duration>,
    ) -> Result<DistributionReceipt> {
        self.validate_batch(source, lines)?;

        let receipt = self.ledger.distribute(source, lines, deadline).await?;

        tracing::info!(
            source = %source,
            lines = lines.len(),
            issued = receipt.issued_amount(),
            reason,
            "Distribution completed"
        );

        Ok(receipt)
    }

    /// Batch policy checks, before touching any wallet
    fn validate_batch(&self, source: WalletId, lines: &[DistributionLine]) -> Result<()> {
        if lines.is_empty() {
            return Err(Error::EmptyBatch);
        }

        if lines.len() > self.config.max_recipients {
            return Err(Error::BatchTooLarge {
                size: lines.len(),
                max: self.config.max_recipients,
            });
        }

        for (line_no, line) in lines.iter().enumerate() {
            if line.amount <= 0 {
                return Err(Error::InvalidLine {
                    line: line_no,
                    reason: format!("amount {} must be positive", line.amount),
                });
            }
            // A line targeting the source would classify as issuance
            // and silently mint; shortfall issuance is the only
            // sanctioned mint path
            if line.recipient == source {
                return Err(Error::InvalidLine {
                    line: line_no,
                    reason: "recipient is the source wallet".to_string(),
                });
            }
        }

        Ok(())
    }
}
