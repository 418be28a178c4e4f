use std::fmt;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tokio::time::MissedTickBehavior;

use crate::builder::UnsignedTransfer;
use crate::error::{LedgerError, LedgerResult, SignerError};
use crate::provider::{Ledger, SignatureStatus};
use crate::signer::ExternalSigner;

/// Lifecycle of one transfer attempt.
///
/// `Idle → Built → Signed → Submitted → Confirmed` on success; any step may
/// end in `Failed`, and a submitted attempt whose confirmation wait expires
/// ends in `TimedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    TimedOut,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Confirmed | AttemptState::Failed | AttemptState::TimedOut
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptState::Idle => "idle",
            AttemptState::Built => "built",
            AttemptState::Signed => "signed",
            AttemptState::Submitted => "submitted",
            AttemptState::Confirmed => "confirmed",
            AttemptState::Failed => "failed",
            AttemptState::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Shortest delay between two status queries, whatever the policy asks for.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounds on waiting for a submitted transfer to land.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// How the confirmation wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Failed(String),
    TimedOut,
}

/// A transfer the signer accepted and submitted.
#[derive(Debug)]
pub struct Submission {
    pub signature: Signature,
    /// `Err` when the ledger could not be queried while waiting.
    pub outcome: LedgerResult<Confirmation>,
}

/// Hand `transfer` to the signer, then wait for the ledger to confirm it.
///
/// Only signer failures are returned as `Err`: past that point a signature
/// exists and the caller needs it whatever happened next.
pub async fn submit_and_confirm(
    signer: &dyn ExternalSigner,
    ledger: &dyn Ledger,
    transfer: &UnsignedTransfer,
    policy: ConfirmPolicy,
) -> Result<Submission, SignerError> {
    let signature = signer.sign_and_send(&transfer.transaction).await?;
    tracing::info!(
        signature = %signature,
        asset = %transfer.asset,
        state = %AttemptState::Submitted,
        "Transfer signed and submitted"
    );

    let outcome = wait_for_confirmation(ledger, &signature, policy).await;
    Ok(Submission { signature, outcome })
}

/// Poll the signature status until it is final or `policy.timeout` elapses.
pub async fn wait_for_confirmation(
    ledger: &dyn Ledger,
    signature: &Signature,
    policy: ConfirmPolicy,
) -> LedgerResult<Confirmation> {
    match tokio::time::timeout(policy.timeout, poll_status(ledger, signature, policy.poll_interval))
        .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                signature = %signature,
                timeout_secs = policy.timeout.as_secs(),
                "Confirmation wait expired"
            );
            Ok(Confirmation::TimedOut)
        }
    }
}

async fn poll_status(
    ledger: &dyn Ledger,
    signature: &Signature,
    interval: Duration,
) -> Result<Confirmation, LedgerError> {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match ledger.signature_status(signature, false).await? {
            SignatureStatus::Confirmed => return Ok(Confirmation::Confirmed),
            SignatureStatus::Failed(reason) => return Ok(Confirmation::Failed(reason)),
            SignatureStatus::Unknown => {
                tracing::trace!(signature = %signature, "Not confirmed yet")
            }
        }
    }
}
