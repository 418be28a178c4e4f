use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::error::SignerError;

/// The wallet that owns the keys. This system never holds key material; it
/// only asks the signer to approve, sign and submit.
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    /// Ask the wallet to expose its account. Returns the account reference.
    async fn connect(&self) -> Result<Pubkey, SignerError>;

    async fn disconnect(&self) -> Result<(), SignerError>;

    /// Sign `transaction` and submit it to the ledger, returning its signature.
    async fn sign_and_send(&self, transaction: &Transaction) -> Result<Signature, SignerError>;
}

// ─── HTTP bridge ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    public_key: String,
}

#[derive(Debug, Serialize)]
struct SignRequest {
    /// Hex-encoded bincode of the unsigned transaction.
    transaction: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// [`ExternalSigner`] reached through a wallet bridge speaking JSON over HTTP.
///
/// * `POST {base}/connect` → `{"public_key": "<base58>"}`
/// * `POST {base}/disconnect`
/// * `POST {base}/sign-and-send` with `{"transaction": "<hex>"}` → `{"signature": "<base58>"}`
///
/// A 4xx answer means the user (or the wallet) refused the request. A bridge
/// that does not answer within the request timeout counts as unavailable.
#[derive(Debug, Clone)]
pub struct BridgeSigner {
    client: reqwest::Client,
    base_url: String,
}

/// Default bound on one bridge request, user approval included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

impl BridgeSigner {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SignerError> {
        Self::with_request_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, SignerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .build()
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, SignerError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<BridgeErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| status.to_string());
        if status.is_client_error() && status != StatusCode::NOT_FOUND {
            Err(SignerError::Rejected(message))
        } else {
            Err(SignerError::Unavailable(message))
        }
    }
}

#[async_trait]
impl ExternalSigner for BridgeSigner {
    async fn connect(&self) -> Result<Pubkey, SignerError> {
        let body: ConnectResponse = self
            .post("connect", &serde_json::json!({}))
            .await?
            .json()
            .await
            .map_err(|e| SignerError::Decode(e.to_string()))?;
        Pubkey::from_str(&body.public_key)
            .map_err(|_| SignerError::Decode(format!("public key {:?}", body.public_key)))
    }

    async fn disconnect(&self) -> Result<(), SignerError> {
        self.post("disconnect", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn sign_and_send(&self, transaction: &Transaction) -> Result<Signature, SignerError> {
        let bytes =
            bincode::serialize(transaction).map_err(|e| SignerError::Decode(e.to_string()))?;
        let request = SignRequest {
            transaction: hex::encode(bytes),
        };
        let body: SignResponse = self
            .post("sign-and-send", &request)
            .await?
            .json()
            .await
            .map_err(|e| SignerError::Decode(e.to_string()))?;
        Signature::from_str(&body.signature)
            .map_err(|_| SignerError::Decode(format!("signature {:?}", body.signature)))
    }
}
