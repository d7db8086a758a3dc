//! Ledger server binary

use ledger_core::{Config, Ledger};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting token ledger server");

    // Load configuration (env overrides over defaults)
    let config = Config::from_env()?;

    // Open ledger
    let ledger = Ledger::open(config).await?;
    let stats = ledger.storage_stats()?;
    tracing::info!(
        wallets = stats.total_wallets,
        transactions = stats.total_transactions,
        "Ledger opened"
    );

    // The API layer lives outside this crate; keep running until
    // interrupted
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    Ok(())
}
