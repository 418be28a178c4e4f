use solana_sdk::signature::Signature;
use thiserror::Error;

use crate::asset::Asset;

/// Result type for ledger RPC operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure talking to the ledger RPC endpoint.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("invalid RPC response: {0}")]
    Decode(String),
}

/// Failure reported by (or while reaching) the external signer.
#[derive(Debug, Error)]
pub enum SignerError {
    /// No signer is reachable (extension missing, bridge down).
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    /// The user declined the request.
    #[error("request rejected by signer: {0}")]
    Rejected(String),

    #[error("invalid signer response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount cannot be negative")]
    Negative,

    #[error("amount is not a decimal number: {0}")]
    Malformed(String),

    #[error("amount has more than {decimals} decimal places")]
    TooPrecise { decimals: u8 },

    #[error("amount is too large")]
    Overflow,
}

/// Input rejected before any transfer is built.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("insufficient {asset} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        requested: String,
        available: String,
    },
}

/// Everything that can end a wallet action, grouped the way the dashboard
/// reports them.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("wallet not connected")]
    NotConnected,

    #[error("a transfer is already in progress")]
    AttemptInFlight,

    #[error("could not build transfer: {0}")]
    Build(String),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("transfer {signature} failed on the ledger: {reason}")]
    TransferFailed { signature: Signature, reason: String },

    #[error("transfer {signature} was not confirmed in time")]
    ConfirmationTimedOut { signature: Signature },

    #[error("could not confirm transfer {signature}: {source}")]
    ConfirmationUnknown {
        signature: Signature,
        #[source]
        source: LedgerError,
    },

    /// The transfer was submitted but its record could not be written.
    #[error("transfer {signature} submitted but not recorded: {reason}")]
    Bookkeeping { signature: Signature, reason: String },
}

impl WalletError {
    /// Submission identifier, if the attempt got far enough to have one.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            WalletError::TransferFailed { signature, .. }
            | WalletError::ConfirmationTimedOut { signature }
            | WalletError::ConfirmationUnknown { signature, .. }
            | WalletError::Bookkeeping { signature, .. } => Some(signature),
            _ => None,
        }
    }
}
