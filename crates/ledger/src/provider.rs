use async_trait::async_trait;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::error::{LedgerError, LedgerResult};

/// What the ledger currently knows about a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Not (yet) visible at the configured commitment.
    Unknown,
    Confirmed,
    Failed(String),
}

/// Read/submit surface of the ledger RPC endpoint used by the transfer flow.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Native balance of `owner`, in smallest units.
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64>;

    /// Raw (smallest unit) balance held by a token account.
    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<u64>;

    /// A fresh routing token to attach to a transfer. Expires quickly.
    async fn latest_blockhash(&self) -> LedgerResult<Hash>;

    /// Fee the ledger would charge for `message`, in smallest native units.
    async fn fee_for_message(&self, message: &Message) -> LedgerResult<u64>;

    /// Status of a submitted transfer. Without `search_history` only the
    /// node's recent status cache is consulted.
    async fn signature_status(
        &self,
        signature: &Signature,
        search_history: bool,
    ) -> LedgerResult<SignatureStatus>;
}

/// [`Ledger`] backed by the public JSON-RPC endpoint.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

/// Create an RPC-backed ledger reading at `confirmed` commitment.
pub fn create_ledger(rpc_url: &str) -> RpcLedger {
    let client = RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());
    RpcLedger::new(client)
}

fn rpc_err(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Rpc(e.to_string())
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn native_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        self.client.get_balance(owner).await.map_err(rpc_err)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> LedgerResult<u64> {
        let amount = self
            .client
            .get_token_account_balance(account)
            .await
            .map_err(rpc_err)?;
        amount
            .amount
            .parse()
            .map_err(|_| LedgerError::Decode(format!("token amount {:?}", amount.amount)))
    }

    async fn latest_blockhash(&self) -> LedgerResult<Hash> {
        self.client.get_latest_blockhash().await.map_err(rpc_err)
    }

    async fn fee_for_message(&self, message: &Message) -> LedgerResult<u64> {
        self.client.get_fee_for_message(message).await.map_err(rpc_err)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        search_history: bool,
    ) -> LedgerResult<SignatureStatus> {
        let status = self
            .client
            .get_signature_status_with_commitment_and_history(
                signature,
                self.client.commitment(),
                search_history,
            )
            .await
            .map_err(rpc_err)?;
        Ok(match status {
            None => SignatureStatus::Unknown,
            Some(Ok(())) => SignatureStatus::Confirmed,
            Some(Err(e)) => SignatureStatus::Failed(e.to_string()),
        })
    }
}
