//! In-memory stand-ins for the ledger, the signer and the bookkeeping store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tokio::sync::Notify;

use crate::error::{LedgerError, LedgerResult, SignerError};
use crate::provider::{Ledger, SignatureStatus};
use crate::session::{AttemptRecord, AttemptRecorder};
use crate::signer::ExternalSigner;

// ─── Ledger ─────────────────────────────────────────────────────────────────

enum Landing {
    ConfirmOnQuery(usize),
    Fail(String),
}

#[derive(Default)]
struct LedgerState {
    native: HashMap<Pubkey, u64>,
    native_error: Option<String>,
    tokens: HashMap<Pubkey, u64>,
    blockhash: Option<Hash>,
    blockhash_error: Option<String>,
    fee: u64,
    landings: HashMap<Signature, Landing>,
    status_error: Option<String>,
    on_confirm: Option<(Pubkey, u64)>,
    status_queries: usize,
}

#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    fn with<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_native(&self, owner: Pubkey, lamports: u64) {
        self.with(|s| s.native.insert(owner, lamports));
    }

    pub fn fail_native(&self, reason: &str) {
        self.with(|s| s.native_error = Some(reason.into()));
    }

    /// Token accounts never set are reported as missing.
    pub fn set_token(&self, account: Pubkey, units: u64) {
        self.with(|s| s.tokens.insert(account, units));
    }

    pub fn set_blockhash(&self, blockhash: Hash) {
        self.with(|s| s.blockhash = Some(blockhash));
    }

    pub fn fail_blockhash(&self, reason: &str) {
        self.with(|s| s.blockhash_error = Some(reason.into()));
    }

    pub fn set_fee(&self, lamports: u64) {
        self.with(|s| s.fee = lamports);
    }

    /// `signature` reads as confirmed from the `queries`-th status query on.
    pub fn confirm_after(&self, signature: Signature, queries: usize) {
        self.with(|s| s.landings.insert(signature, Landing::ConfirmOnQuery(queries)));
    }

    pub fn fail_signature(&self, signature: Signature, reason: &str) {
        self.with(|s| s.landings.insert(signature, Landing::Fail(reason.into())));
    }

    pub fn fail_status_queries(&self, reason: &str) {
        self.with(|s| s.status_error = Some(reason.into()));
    }

    /// Move `owner`'s native balance to `lamports` once a signature confirms.
    pub fn set_native_on_confirm(&self, owner: Pubkey, lamports: u64) {
        self.with(|s| s.on_confirm = Some((owner, lamports)));
    }

    pub fn status_queries(&self) -> usize {
        self.with(|s| s.status_queries)
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        self.with(|s| match &s.native_error {
            Some(reason) => Err(LedgerError::Rpc(reason.clone())),
            None => Ok(s.native.get(owner).copied().unwrap_or(0)),
        })
    }

    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<u64> {
        self.with(|s| {
            s.tokens
                .get(account)
                .copied()
                .ok_or_else(|| LedgerError::Rpc(format!("could not find account {account}")))
        })
    }

    async fn latest_blockhash(&self) -> LedgerResult<Hash> {
        self.with(|s| match &s.blockhash_error {
            Some(reason) => Err(LedgerError::Rpc(reason.clone())),
            None => Ok(s.blockhash.unwrap_or_else(|| Hash::new_from_array([7; 32]))),
        })
    }

    async fn fee_for_message(&self, _message: &Message) -> LedgerResult<u64> {
        Ok(self.with(|s| s.fee))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _search_history: bool,
    ) -> LedgerResult<SignatureStatus> {
        self.with(|s| {
            s.status_queries += 1;
            if let Some(reason) = &s.status_error {
                return Err(LedgerError::Rpc(reason.clone()));
            }
            let status = match s.landings.get(signature) {
                Some(Landing::ConfirmOnQuery(n)) if s.status_queries >= *n => {
                    SignatureStatus::Confirmed
                }
                Some(Landing::Fail(reason)) => SignatureStatus::Failed(reason.clone()),
                _ => SignatureStatus::Unknown,
            };
            if status == SignatureStatus::Confirmed {
                if let Some((owner, lamports)) = s.on_confirm.take() {
                    s.native.insert(owner, lamports);
                }
            }
            Ok(status)
        })
    }
}

// ─── Signer ─────────────────────────────────────────────────────────────────

pub struct FakeSigner {
    account: Pubkey,
    signature: Signature,
    rejection: Option<String>,
    gate: Option<Arc<Notify>>,
    sign_calls: AtomicUsize,
}

impl FakeSigner {
    fn new(rejection: Option<String>, gate: Option<Arc<Notify>>) -> Self {
        Self {
            account: Pubkey::new_unique(),
            signature: Signature::new_unique(),
            rejection,
            gate,
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::new(None, None)
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::new(Some(reason.into()), None)
    }

    /// Accepts, but only after the returned handle is notified.
    pub fn blocking() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (Self::new(None, Some(gate.clone())), gate)
    }

    pub fn account(&self) -> Pubkey {
        self.account
    }

    /// Signature the next accepted transfer will be submitted under.
    pub fn next_signature(&self) -> Signature {
        self.signature
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalSigner for FakeSigner {
    async fn connect(&self) -> Result<Pubkey, SignerError> {
        Ok(self.account)
    }

    async fn disconnect(&self) -> Result<(), SignerError> {
        Ok(())
    }

    async fn sign_and_send(&self, _transaction: &Transaction) -> Result<Signature, SignerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.rejection {
            Some(reason) => Err(SignerError::Rejected(reason.clone())),
            None => Ok(self.signature),
        }
    }
}

// ─── Recorder ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<AttemptRecord>>,
    failure: Option<String>,
}

impl MemoryRecorder {
    pub fn failing(reason: &str) -> Self {
        Self {
            records: Mutex::default(),
            failure: Some(reason.into()),
        }
    }

    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttemptRecorder for MemoryRecorder {
    async fn record(&self, attempt: &AttemptRecord) -> eyre::Result<()> {
        if let Some(reason) = &self.failure {
            eyre::bail!("{reason}");
        }
        self.records.lock().unwrap().push(attempt.clone());
        Ok(())
    }
}
