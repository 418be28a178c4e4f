//! Writes wallet transfer attempts to the `transactions` table.

use async_trait::async_trait;
use coinvoy_ledger::{AttemptRecord, AttemptRecorder, AttemptStatus};
use coinvoy_storage::models::{Direction, NewTransaction, TransferStatus};
use coinvoy_storage::{self as storage, PgPool};
use uuid::Uuid;

/// Records attempts on behalf of one signed-in user.
pub struct PgAttemptRecorder<'a> {
    pub pool: &'a PgPool,
    pub user_id: Uuid,
}

pub fn transfer_status(status: AttemptStatus) -> TransferStatus {
    match status {
        AttemptStatus::Pending => TransferStatus::Pending,
        AttemptStatus::Completed => TransferStatus::Completed,
        AttemptStatus::Failed => TransferStatus::Failed,
        AttemptStatus::TimedOut => TransferStatus::TimedOut,
    }
}

pub fn new_transaction(user_id: Uuid, attempt: &AttemptRecord) -> NewTransaction {
    NewTransaction {
        user_id,
        direction: Direction::Send,
        amount: attempt.amount.clone(),
        currency: attempt.asset.code().to_string(),
        recipient_email: None,
        recipient_wallet: Some(attempt.recipient.to_string()),
        status: transfer_status(attempt.status),
        signature: Some(attempt.signature.to_string()),
    }
}

#[async_trait]
impl AttemptRecorder for PgAttemptRecorder<'_> {
    async fn record(&self, attempt: &AttemptRecord) -> eyre::Result<()> {
        let row = new_transaction(self.user_id, attempt);
        let id = storage::repos::insert_transaction(self.pool, &row).await?;
        tracing::debug!(id = %id, status = ?attempt.status, "Transfer attempt recorded");
        Ok(())
    }
}
