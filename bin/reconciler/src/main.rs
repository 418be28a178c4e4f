//! CoinVoy Reconciler — settles wallet transfers whose outcome was unknown
//! when they were recorded.
//!
//! Flow:
//! 1. Connect to the ledger RPC & PostgreSQL
//! 2. Every interval, load `pending` / `timed_out` records that carry a signature
//! 3. Ask the ledger for each signature's status, searching its full history
//! 4. Move confirmed ones to `completed` and rejected ones to `failed`
//!
//! Signatures the ledger does not know yet are left for the next pass, until
//! their routing token has long expired: such a transfer can no longer land
//! and is settled as `failed`.

use chrono::{Duration, Utc};
use coinvoy_core::{Settings, telemetry};
use coinvoy_ledger::{Ledger, Signature, SignatureStatus, create_ledger};
use coinvoy_storage::{self as storage, models::*};
use eyre::Result;

/// Records examined per pass.
const BATCH_SIZE: i64 = 100;

/// Age after which a signature the ledger never saw counts as dropped.
/// Routing tokens expire after roughly 150 slots (about a minute).
const DROPPED_AFTER_SECS: i64 = 600;

#[derive(Debug, Default, PartialEq, Eq)]
struct PassSummary {
    completed: usize,
    failed: usize,
    dropped: usize,
    unresolved: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Initialisation ──────────────────────────────────────────────────
    telemetry::init();
    let settings = Settings::from_env()?;

    tracing::info!(rpc = %settings.rpc_url, "Starting CoinVoy Reconciler");

    let pool = storage::connect(&settings.database_url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database ready");

    let ledger = create_ledger(&settings.rpc_url);

    // ── Main Loop ───────────────────────────────────────────────────────
    let interval = settings.reconcile_interval();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully…");
                break;
            }
            result = reconcile_pass(&ledger, &pool) => {
                match result {
                    Ok(summary) if summary != PassSummary::default() => {
                        tracing::info!(
                            completed = summary.completed,
                            failed = summary.failed,
                            dropped = summary.dropped,
                            unresolved = summary.unresolved,
                            "Reconcile pass finished"
                        );
                    }
                    Ok(_) => tracing::debug!("Nothing to reconcile"),
                    Err(e) => tracing::error!(error = %e, "Reconcile pass failed"),
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    tracing::info!("Reconciler stopped.");
    Ok(())
}

/// Map a ledger status to the record status it settles to, if any.
///
/// `age` is how long ago the record was written.
fn settled_status(status: &SignatureStatus, age: Duration) -> Option<TransferStatus> {
    match status {
        SignatureStatus::Confirmed => Some(TransferStatus::Completed),
        SignatureStatus::Failed(_) => Some(TransferStatus::Failed),
        SignatureStatus::Unknown if age.num_seconds() >= DROPPED_AFTER_SECS => {
            Some(TransferStatus::Failed)
        }
        SignatureStatus::Unknown => None,
    }
}

async fn settle(
    pool: &sqlx::PgPool,
    record: &Transaction,
    status: TransferStatus,
    reason: &str,
) -> Result<bool> {
    let updated = storage::repos::update_transaction_status(pool, record.id, status).await?;
    if updated {
        tracing::info!(
            id = %record.id,
            signature = ?record.signature,
            from = %record.status,
            to = %status,
            reason,
            "Transfer settled"
        );
    }
    Ok(updated)
}

async fn reconcile_pass(ledger: &dyn Ledger, pool: &sqlx::PgPool) -> Result<PassSummary> {
    let records = storage::repos::get_unsettled_transactions(pool, BATCH_SIZE).await?;
    let now = Utc::now().naive_utc();
    let mut summary = PassSummary::default();

    for record in records {
        let Some(raw) = record.signature.as_deref() else {
            continue;
        };
        let signature: Signature = match raw.parse() {
            Ok(sig) => sig,
            Err(e) => {
                // Can never be looked up.
                tracing::warn!(
                    id = %record.id,
                    signature = raw,
                    error = %e,
                    "Unparseable signature"
                );
                if settle(pool, &record, TransferStatus::Failed, "unparseable signature").await? {
                    summary.dropped += 1;
                }
                continue;
            }
        };

        let status = match ledger.signature_status(&signature, true).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Status lookup failed");
                summary.unresolved += 1;
                continue;
            }
        };

        let Some(settled) = settled_status(&status, now - record.created_at) else {
            summary.unresolved += 1;
            continue;
        };
        let reason = match &status {
            SignatureStatus::Confirmed => "confirmed",
            SignatureStatus::Failed(reason) => reason.as_str(),
            SignatureStatus::Unknown => "never seen by the ledger",
        };
        if settle(pool, &record, settled, reason).await? {
            match (&status, settled) {
                (SignatureStatus::Unknown, _) => summary.dropped += 1,
                (_, TransferStatus::Completed) => summary.completed += 1,
                _ => summary.failed += 1,
            }
        }
    }

    Ok(summary)
}
