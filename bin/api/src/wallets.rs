//! One wallet session per signed-in user.

use std::collections::HashMap;
use std::sync::Arc;

use coinvoy_ledger::{
    BridgeSigner, ExternalSigner, Ledger, SessionConfig, SignerError, WalletError, WalletSession,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Builds the signer handle a user's session talks to.
pub type SignerFactory =
    Arc<dyn Fn(Uuid) -> Result<Arc<dyn ExternalSigner>, SignerError> + Send + Sync>;

/// Signers reached through the wallet bridge at `{base_url}/{user id}`.
pub fn bridge_signers(base_url: &str, request_timeout: std::time::Duration) -> SignerFactory {
    let base_url = base_url.trim_end_matches('/').to_string();
    Arc::new(move |user_id| {
        let signer =
            BridgeSigner::with_request_timeout(format!("{base_url}/{user_id}"), request_timeout)?;
        Ok(Arc::new(signer) as Arc<dyn ExternalSigner>)
    })
}

pub struct WalletRegistry {
    ledger: Arc<dyn Ledger>,
    signers: SignerFactory,
    config: SessionConfig,
    sessions: RwLock<HashMap<Uuid, Arc<WalletSession>>>,
}

impl WalletRegistry {
    pub fn new(ledger: Arc<dyn Ledger>, signers: SignerFactory, config: SessionConfig) -> Self {
        Self {
            ledger,
            signers,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<Arc<WalletSession>> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    /// The user's session, or `NotConnected` when they have none.
    pub async fn connected(&self, user_id: Uuid) -> Result<Arc<WalletSession>, WalletError> {
        self.get(user_id).await.ok_or(WalletError::NotConnected)
    }

    /// Connect the user's wallet, creating their session on first use.
    pub async fn connect(&self, user_id: Uuid) -> Result<Arc<WalletSession>, WalletError> {
        let session = match self.get(user_id).await {
            Some(session) => session,
            None => {
                let signer = (self.signers)(user_id)?;
                let fresh = Arc::new(WalletSession::new(self.ledger.clone(), signer, self.config));
                self.sessions
                    .write()
                    .await
                    .entry(user_id)
                    .or_insert(fresh)
                    .clone()
            }
        };

        if let Err(e) = session.connect().await {
            self.forget(user_id, &session).await;
            return Err(e);
        }
        Ok(session)
    }

    /// Disconnect the user's wallet and drop their session.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<(), WalletError> {
        let session = self.connected(user_id).await?;
        let result = session.disconnect().await;
        self.forget(user_id, &session).await;
        result
    }

    /// Drop the user's session without talking to their signer.
    pub async fn remove(&self, user_id: Uuid) {
        if self.sessions.write().await.remove(&user_id).is_some() {
            tracing::debug!(user = %user_id, "Wallet session dropped");
        }
    }

    async fn forget(&self, user_id: Uuid, session: &Arc<WalletSession>) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&user_id)
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            sessions.remove(&user_id);
        }
    }
}
