//! The wallet connection shared by the dashboard.
//!
//! One [`WalletSession`] is constructed at startup and passed down to whoever
//! needs it. It owns the connect/disconnect lifecycle, the cached balances,
//! the form checks that run before anything is built, and the loading gate
//! that keeps at most one transfer attempt in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use coinvoy_core::Settings;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::RwLock;

use crate::accounts::parse_account;
use crate::asset::{Asset, format_units, parse_units};
use crate::balances::{Balances, read_balances};
use crate::builder::{build_transfer, estimate_fee};
use crate::error::{ValidationError, WalletError};
use crate::provider::Ledger;
use crate::signer::ExternalSigner;
use crate::submitter::{AttemptState, ConfirmPolicy, Confirmation, submit_and_confirm};

// ─── Bookkeeping port ───────────────────────────────────────────────────────

/// Status written with an attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

/// One submitted transfer, as handed to the [`AttemptRecorder`].
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub asset: Asset,
    /// Amount in whole units, e.g. `"2.5"`.
    pub amount: String,
    pub recipient: Pubkey,
    pub status: AttemptStatus,
    pub signature: Signature,
}

/// Writes attempt records to external storage.
#[async_trait]
pub trait AttemptRecorder: Send + Sync {
    async fn record(&self, attempt: &AttemptRecord) -> eyre::Result<()>;
}

// ─── Requests & receipts ────────────────────────────────────────────────────

/// Raw transfer form input.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub asset: Asset,
    pub recipient: String,
    pub amount: String,
}

/// A request that passed every form check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub asset: Asset,
    pub recipient: Pubkey,
    pub units: u64,
}

/// Result of a confirmed transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub signature: String,
    pub asset: Asset,
    pub amount: String,
    pub recipient: String,
    pub balances: Balances,
}

// ─── Session ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Native amount (smallest units) the max-amount helper never offers.
    pub native_reserve: u64,
    pub confirm: ConfirmPolicy,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            native_reserve: settings.native_reserve_lamports,
            confirm: ConfirmPolicy {
                timeout: settings.confirm_timeout(),
                poll_interval: settings.confirm_poll_interval(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct Connection {
    account: Option<Pubkey>,
    balances: Balances,
}

/// Largest amount of `asset` that can be sent out of `balance`.
///
/// The native asset keeps `reserve` back for fees; never negative.
pub fn max_sendable(asset: Asset, balance: u64, reserve: u64) -> u64 {
    if asset.is_native() {
        balance.saturating_sub(reserve)
    } else {
        balance
    }
}

pub struct WalletSession {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn ExternalSigner>,
    config: SessionConfig,
    connection: RwLock<Connection>,
    in_flight: AtomicBool,
}

/// Holds the loading gate for the lifetime of one attempt.
struct AttemptGuard<'a>(&'a AtomicBool);

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl WalletSession {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn ExternalSigner>,
        config: SessionConfig,
    ) -> Self {
        Self {
            ledger,
            signer,
            config,
            connection: RwLock::new(Connection::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn account(&self) -> Option<Pubkey> {
        self.connection.read().await.account
    }

    pub async fn balances(&self) -> Balances {
        self.connection.read().await.balances
    }

    /// Whether the submit action is currently disabled.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Connect the external signer and load its balances.
    ///
    /// A balance read failure does not undo the connection; balances stay at
    /// zero until the next refresh.
    pub async fn connect(&self) -> Result<Pubkey, WalletError> {
        let account = self.signer.connect().await?;
        self.connection.write().await.account = Some(account);
        tracing::info!(account = %account, "Wallet connected");

        if let Err(e) = self.refresh_balances().await {
            tracing::warn!(account = %account, error = %e, "Initial balance read failed");
        }
        Ok(account)
    }

    pub async fn disconnect(&self) -> Result<(), WalletError> {
        self.signer.disconnect().await?;
        *self.connection.write().await = Connection::default();
        tracing::info!("Wallet disconnected");
        Ok(())
    }

    pub async fn refresh_balances(&self) -> Result<Balances, WalletError> {
        let account = self.account().await.ok_or(WalletError::NotConnected)?;
        let balances = read_balances(self.ledger.as_ref(), &account).await?;

        let mut connection = self.connection.write().await;
        // The wallet may have been swapped out while the read was in flight.
        if connection.account == Some(account) {
            connection.balances = balances;
        }
        Ok(balances)
    }

    /// Largest sendable amount of `asset`, in smallest units.
    pub async fn max_amount(&self, asset: Asset) -> Result<u64, WalletError> {
        let connection = self.connection.read().await;
        if connection.account.is_none() {
            return Err(WalletError::NotConnected);
        }
        Ok(max_sendable(
            asset,
            connection.balances.get(asset),
            self.config.native_reserve,
        ))
    }

    /// Form checks: recipient parses, amount is positive and within the max amount.
    pub async fn validate(
        &self,
        request: &TransferRequest,
    ) -> Result<ValidatedTransfer, WalletError> {
        let recipient = parse_account(&request.recipient)?;
        let units = parse_units(&request.amount, request.asset.decimals())
            .map_err(ValidationError::from)?;
        if units == 0 {
            return Err(ValidationError::NonPositiveAmount.into());
        }

        let available = self.max_amount(request.asset).await?;
        if units > available {
            return Err(ValidationError::InsufficientBalance {
                asset: request.asset,
                requested: format_units(units, request.asset.decimals()),
                available: format_units(available, request.asset.decimals()),
            }
            .into());
        }

        Ok(ValidatedTransfer {
            asset: request.asset,
            recipient,
            units,
        })
    }

    /// Network fee for the transfer `request` describes, in lamports.
    pub async fn estimate_fee(&self, request: &TransferRequest) -> Result<u64, WalletError> {
        let sender = self.account().await.ok_or(WalletError::NotConnected)?;
        let transfer = self.validate(request).await?;
        let unsigned = build_transfer(
            self.ledger.as_ref(),
            transfer.asset,
            &sender,
            &transfer.recipient,
            transfer.units,
        )
        .await?;
        Ok(estimate_fee(self.ledger.as_ref(), &unsigned).await?)
    }

    fn begin_attempt(&self) -> Result<AttemptGuard<'_>, WalletError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WalletError::AttemptInFlight)?;
        Ok(AttemptGuard(&self.in_flight))
    }

    /// Run one transfer attempt end to end.
    ///
    /// Nothing is recorded unless the signer returned a signature. Once it
    /// did, exactly one record is written with the outcome known at that
    /// moment, whatever it is.
    pub async fn send(
        &self,
        request: &TransferRequest,
        recorder: &dyn AttemptRecorder,
    ) -> Result<TransferReceipt, WalletError> {
        let _gate = self.begin_attempt()?;

        let sender = self.account().await.ok_or(WalletError::NotConnected)?;
        let transfer = self.validate(request).await?;

        let unsigned = build_transfer(
            self.ledger.as_ref(),
            transfer.asset,
            &sender,
            &transfer.recipient,
            transfer.units,
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(
                asset = %transfer.asset,
                error = %e,
                state = %AttemptState::Failed,
                "Transfer build failed"
            );
        })?;
        tracing::info!(
            asset = %transfer.asset,
            units = transfer.units,
            recipient = %transfer.recipient,
            state = %AttemptState::Built,
            "Transfer built"
        );

        let submission = submit_and_confirm(
            self.signer.as_ref(),
            self.ledger.as_ref(),
            &unsigned,
            self.config.confirm,
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(
                asset = %transfer.asset,
                error = %e,
                state = %AttemptState::Failed,
                "Signer did not submit transfer"
            );
        })?;
        let signature = submission.signature;

        let (status, result) = match submission.outcome {
            Ok(Confirmation::Confirmed) => {
                tracing::info!(
                    signature = %signature,
                    state = %AttemptState::Confirmed,
                    "Transfer confirmed"
                );
                (AttemptStatus::Completed, Ok(()))
            }
            Ok(Confirmation::Failed(reason)) => {
                tracing::warn!(
                    signature = %signature,
                    reason = %reason,
                    state = %AttemptState::Failed,
                    "Transfer failed on ledger"
                );
                (
                    AttemptStatus::Failed,
                    Err(WalletError::TransferFailed { signature, reason }),
                )
            }
            Ok(Confirmation::TimedOut) => (
                AttemptStatus::TimedOut,
                Err(WalletError::ConfirmationTimedOut { signature }),
            ),
            Err(source) => {
                tracing::warn!(
                    signature = %signature,
                    error = %source,
                    "Confirmation status unknown"
                );
                (
                    AttemptStatus::Pending,
                    Err(WalletError::ConfirmationUnknown { signature, source }),
                )
            }
        };

        let balances = if status == AttemptStatus::Completed {
            match self.refresh_balances().await {
                Ok(balances) => balances,
                Err(e) => {
                    tracing::warn!(error = %e, "Balance refresh after transfer failed");
                    self.balances().await
                }
            }
        } else {
            self.balances().await
        };

        let amount = format_units(transfer.units, transfer.asset.decimals());
        let record = AttemptRecord {
            asset: transfer.asset,
            amount: amount.clone(),
            recipient: transfer.recipient,
            status,
            signature,
        };
        if let Err(e) = recorder.record(&record).await {
            tracing::error!(
                signature = %signature,
                status = ?status,
                error = %e,
                "Transfer submitted but its record was not written"
            );
            return Err(WalletError::Bookkeeping {
                signature,
                reason: e.to_string(),
            });
        }

        result.map(|()| TransferReceipt {
            signature: signature.to_string(),
            asset: transfer.asset,
            amount,
            recipient: transfer.recipient.to_string(),
            balances,
        })
    }
}
