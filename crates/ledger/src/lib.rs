//! Wallet transfer flow against the public ledger.
//!
//! The pieces line up with one user action:
//! 1. [`session`] validates the form input and holds the loading gate
//! 2. [`builder`] assembles the unsigned transfer with a fresh blockhash
//! 3. [`submitter`] hands it to the external signer and waits (bounded) for confirmation
//! 4. [`balances`] refreshes what the connected account holds
//! 5. the session writes one attempt record through an [`session::AttemptRecorder`]

pub mod accounts;
pub mod asset;
pub mod balances;
pub mod builder;
pub mod error;
pub mod provider;
pub mod session;
pub mod signer;
pub mod submitter;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::{derive_token_account, parse_account};
pub use asset::{Asset, format_units, parse_units};
pub use balances::{Balances, read_balances};
pub use builder::{UnsignedTransfer, build_transfer};
pub use error::{LedgerError, SignerError, ValidationError, WalletError};
pub use provider::{Ledger, RpcLedger, SignatureStatus, create_ledger};
pub use session::{
    AttemptRecord, AttemptRecorder, AttemptStatus, SessionConfig, TransferReceipt,
    TransferRequest, WalletSession,
};
pub use signer::{BridgeSigner, ExternalSigner};
pub use submitter::{AttemptState, ConfirmPolicy, Confirmation};

pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::Signature;
