//! CoinVoy API Server — the money-transfer dashboard backend.

mod rates;
mod recorder;
mod wallets;

use axum::{
    Json, Router, async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
    routing::{delete, get, post},
};
use coinvoy_auth::{AuthClient, AuthError, AuthUser};
use coinvoy_core::{Language, Preferences, Settings, catalog, telemetry};
use coinvoy_ledger::{
    Asset, SessionConfig, SignerError, TransferRequest, WalletError, WalletSession, create_ledger,
    format_units, parse_units,
};
use coinvoy_storage::{self as storage, models::*};
use rates::RatesClient;
use recorder::PgAttemptRecorder;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use uuid::Uuid;
use wallets::WalletRegistry;

/// Shared application state.
struct AppState {
    pool: sqlx::PgPool,
    auth: AuthClient,
    wallets: WalletRegistry,
    rates: RatesClient,
    preferences: Preferences,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let settings = Settings::from_env()?;
    settings.require_auth()?;

    tracing::info!(rpc = %settings.rpc_url, "Starting CoinVoy API Server");

    let pool = storage::connect(&settings.database_url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database ready");

    let ledger = Arc::new(create_ledger(&settings.rpc_url));
    let wallets = WalletRegistry::new(
        ledger,
        wallets::bridge_signers(&settings.signer_url, settings.signer_timeout()),
        SessionConfig::from_settings(&settings),
    );

    let state = Arc::new(AppState {
        pool,
        auth: AuthClient::new(&settings.auth_url, &settings.auth_anon_key),
        wallets,
        rates: RatesClient::new(&settings.rates_url),
        preferences: Preferences::new(&settings.preferences_path),
    });

    let app = Router::new()
        .route("/api/v1/auth/signup", post(sign_up))
        .route("/api/v1/auth/signin", post(sign_in))
        .route("/api/v1/auth/signout", post(sign_out))
        .route("/api/v1/profile", get(get_profile).put(update_profile))
        .route(
            "/api/v1/bank-accounts",
            get(list_bank_accounts).post(add_bank_account),
        )
        .route("/api/v1/bank-accounts/:id", delete(remove_bank_account))
        .route("/api/v1/wallets", get(list_wallets).post(add_wallet))
        .route("/api/v1/wallets/:id", delete(remove_wallet))
        .route(
            "/api/v1/transactions",
            get(list_transactions).post(record_fiat_transfer),
        )
        .route("/api/v1/wallet", get(wallet_status))
        .route("/api/v1/wallet/connect", post(wallet_connect))
        .route("/api/v1/wallet/disconnect", post(wallet_disconnect))
        .route("/api/v1/wallet/refresh", post(wallet_refresh))
        .route("/api/v1/wallet/max/:asset", get(wallet_max))
        .route("/api/v1/wallet/estimate", post(wallet_estimate))
        .route("/api/v1/wallet/transfer", post(wallet_transfer))
        .route("/api/v1/rates", get(get_rates))
        .route("/api/v1/catalog/countries", get(list_countries))
        .route("/api/v1/catalog/fees", get(list_fees))
        .route(
            "/api/v1/preferences/language",
            get(get_language).put(set_language),
        )
        .route("/api/v1/contact", post(submit_contact))
        .route("/health", get(health))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

type ApiError = (StatusCode, Json<ApiResponse<String>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn json_ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

fn json_err(status: StatusCode, msg: &str) -> ApiError {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: msg.to_string(),
        }),
    )
}

fn db_err(e: sqlx::Error) -> ApiError {
    tracing::error!(error = %e, "Database error");
    json_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

fn auth_err(e: AuthError) -> ApiError {
    let status = match &e {
        AuthError::PasswordMismatch | AuthError::PasswordTooShort | AuthError::MissingEmail => {
            StatusCode::BAD_REQUEST
        }
        AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::Service { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
        AuthError::Service { .. } | AuthError::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    json_err(status, &e.to_string())
}

fn wallet_status_code(e: &WalletError) -> StatusCode {
    match e {
        WalletError::Validation(_) => StatusCode::BAD_REQUEST,
        WalletError::NotConnected | WalletError::AttemptInFlight => StatusCode::CONFLICT,
        WalletError::Signer(SignerError::Rejected(_)) => StatusCode::FORBIDDEN,
        WalletError::Signer(_) => StatusCode::SERVICE_UNAVAILABLE,
        WalletError::Build(_)
        | WalletError::Ledger(_)
        | WalletError::ConfirmationUnknown { .. } => StatusCode::BAD_GATEWAY,
        WalletError::TransferFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WalletError::ConfirmationTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        WalletError::Bookkeeping { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn wallet_err(e: WalletError) -> ApiError {
    json_err(wallet_status_code(&e), &e.to_string())
}

// ─── Authentication ─────────────────────────────────────────────────────────

/// The signed-in user behind a `Authorization: Bearer` header.
struct Authenticated {
    user: AuthUser,
    token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| json_err(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;

        let user = state.auth.get_user(token).await.map_err(auth_err)?;
        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SignUpBody {
    email: String,
    password: String,
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct BankAccountBody {
    bank_name: String,
    account_number: String,
    account_type: String,
}

#[derive(Debug, Deserialize)]
struct WalletBody {
    wallet_address: String,
    wallet_type: String,
}

#[derive(Debug, Deserialize)]
struct TransactionParams {
    direction: Option<Direction>,
    limit: Option<i64>,
}

/// A fiat transfer entered through the dashboard form.
#[derive(Debug, Deserialize)]
struct FiatTransferBody {
    amount: String,
    currency: String,
    recipient_email: String,
}

#[derive(Debug, Deserialize)]
struct LanguageBody {
    language: Language,
}

#[derive(Debug, Deserialize)]
struct ContactBody {
    email: String,
    phone: String,
    notes: String,
}

// ─── Wallet Response Types ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WalletView {
    account: Option<String>,
    balances: Vec<BalanceEntry>,
    in_flight: bool,
}

#[derive(Debug, Serialize)]
struct BalanceEntry {
    asset: Asset,
    amount: String,
}

#[derive(Debug, Serialize)]
struct AmountView {
    asset: Asset,
    amount: String,
}

async fn wallet_view(wallet: Option<&WalletSession>) -> WalletView {
    let Some(wallet) = wallet else {
        return WalletView {
            account: None,
            balances: Vec::new(),
            in_flight: false,
        };
    };
    let balances = wallet.balances().await;
    WalletView {
        account: wallet.account().await.map(|a| a.to_string()),
        balances: Asset::ALL
            .iter()
            .map(|&asset| BalanceEntry {
                asset,
                amount: balances.whole(asset),
            })
            .collect(),
        in_flight: wallet.is_in_flight(),
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

/// POST /api/v1/auth/signup — create an account (and its profile).
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignUpBody>,
) -> Result<impl IntoResponse, ApiError> {
    let signup = state
        .auth
        .sign_up(&body.email, &body.password, &body.confirm_password)
        .await
        .map_err(auth_err)?;
    storage::repos::ensure_profile(&state.pool, signup.user.id, &body.email)
        .await
        .map_err(db_err)?;
    Ok((StatusCode::CREATED, json_ok(signup)))
}

/// POST /api/v1/auth/signin — exchange email/password for a session.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignInBody>,
) -> ApiResult<coinvoy_auth::Session> {
    let session = state
        .auth
        .sign_in(&body.email, &body.password)
        .await
        .map_err(auth_err)?;
    storage::repos::ensure_profile(&state.pool, session.user.id, &body.email)
        .await
        .map_err(db_err)?;
    Ok(json_ok(session))
}

/// POST /api/v1/auth/signout
async fn sign_out(State(state): State<Arc<AppState>>, auth: Authenticated) -> ApiResult<()> {
    state.auth.sign_out(&auth.token).await.map_err(auth_err)?;
    state.wallets.remove(auth.user.id).await;
    Ok(json_ok(()))
}

/// GET /api/v1/profile
async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<Profile> {
    let profile = match storage::repos::get_profile(&state.pool, auth.user.id)
        .await
        .map_err(db_err)?
    {
        Some(p) => p,
        None => {
            let email = auth.user.email.as_deref().unwrap_or_default();
            storage::repos::ensure_profile(&state.pool, auth.user.id, email)
                .await
                .map_err(db_err)?
        }
    };
    Ok(json_ok(profile))
}

/// PUT /api/v1/profile — update the display name.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(body): Json<ProfileBody>,
) -> ApiResult<Profile> {
    let name = body.full_name.trim();
    let profile = storage::repos::update_profile_name(&state.pool, auth.user.id, name)
        .await
        .map_err(db_err)?
        .ok_or_else(|| json_err(StatusCode::NOT_FOUND, "Profile not found"))?;
    Ok(json_ok(profile))
}

/// GET /api/v1/bank-accounts
async fn list_bank_accounts(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<Vec<BankAccount>> {
    let accounts = storage::repos::get_bank_accounts(&state.pool, auth.user.id)
        .await
        .map_err(db_err)?;
    Ok(json_ok(accounts))
}

/// POST /api/v1/bank-accounts — link a bank account; only the last four digits are kept.
async fn add_bank_account(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(body): Json<BankAccountBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.bank_name.trim().is_empty() || body.account_number.trim().len() < 4 {
        return Err(json_err(
            StatusCode::BAD_REQUEST,
            "Bank name and an account number of at least 4 digits are required",
        ));
    }
    let account = NewBankAccount {
        user_id: auth.user.id,
        bank_name: body.bank_name.trim().to_string(),
        account_number_last4: NewBankAccount::last4(&body.account_number),
        account_type: body.account_type,
    };
    let account = storage::repos::insert_bank_account(&state.pool, &account)
        .await
        .map_err(db_err)?;
    tracing::info!(user = %auth.user.id, id = %account.id, "Bank account linked");
    Ok((StatusCode::CREATED, json_ok(account)))
}

/// DELETE /api/v1/bank-accounts/:id
async fn remove_bank_account(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !storage::repos::delete_bank_account(&state.pool, auth.user.id, id)
        .await
        .map_err(db_err)?
    {
        return Err(json_err(StatusCode::NOT_FOUND, "Bank account not found"));
    }
    Ok(json_ok(()))
}

/// GET /api/v1/wallets — linked wallet addresses.
async fn list_wallets(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<Vec<CryptoWallet>> {
    let wallets = storage::repos::get_wallets(&state.pool, auth.user.id)
        .await
        .map_err(db_err)?;
    Ok(json_ok(wallets))
}

/// POST /api/v1/wallets
async fn add_wallet(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(body): Json<WalletBody>,
) -> Result<impl IntoResponse, ApiError> {
    let address = body.wallet_address.trim();
    if address.is_empty() {
        return Err(json_err(StatusCode::BAD_REQUEST, "Wallet address is required"));
    }
    let wallet = NewCryptoWallet {
        user_id: auth.user.id,
        wallet_address: address.to_string(),
        wallet_type: body.wallet_type,
    };
    let wallet = storage::repos::insert_wallet(&state.pool, &wallet)
        .await
        .map_err(db_err)?;
    Ok((StatusCode::CREATED, json_ok(wallet)))
}

/// DELETE /api/v1/wallets/:id
async fn remove_wallet(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    if !storage::repos::delete_wallet(&state.pool, auth.user.id, id)
        .await
        .map_err(db_err)?
    {
        return Err(json_err(StatusCode::NOT_FOUND, "Wallet not found"));
    }
    Ok(json_ok(()))
}

/// GET /api/v1/transactions?direction=send|receive — transfer history, newest first.
async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Query(params): Query<TransactionParams>,
) -> ApiResult<Vec<Transaction>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let transactions =
        storage::repos::get_transactions(&state.pool, auth.user.id, params.direction, limit)
            .await
            .map_err(db_err)?;
    Ok(json_ok(transactions))
}

/// POST /api/v1/transactions — record a fiat transfer to an email recipient.
async fn record_fiat_transfer(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(body): Json<FiatTransferBody>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = body.currency.trim().to_uppercase();
    if !catalog::fiat_currencies().any(|c| c == currency) {
        return Err(json_err(StatusCode::BAD_REQUEST, "Unsupported currency"));
    }
    if !body.recipient_email.contains('@') {
        return Err(json_err(StatusCode::BAD_REQUEST, "Recipient email is invalid"));
    }
    let cents = parse_units(&body.amount, 2)
        .map_err(|e| json_err(StatusCode::BAD_REQUEST, &e.to_string()))?;
    if cents == 0 {
        return Err(json_err(StatusCode::BAD_REQUEST, "Amount must be greater than zero"));
    }

    let tx = NewTransaction {
        user_id: auth.user.id,
        direction: Direction::Send,
        amount: format_units(cents, 2),
        currency,
        recipient_email: Some(body.recipient_email.trim().to_string()),
        recipient_wallet: None,
        status: TransferStatus::Completed,
        signature: None,
    };
    let id = storage::repos::insert_transaction(&state.pool, &tx)
        .await
        .map_err(db_err)?;
    Ok((StatusCode::CREATED, json_ok(id)))
}

// ─── Wallet Flow ────────────────────────────────────────────────────────────

/// GET /api/v1/wallet — the caller's connected account, balances and in-flight flag.
async fn wallet_status(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<WalletView> {
    let wallet = state.wallets.get(auth.user.id).await;
    Ok(json_ok(wallet_view(wallet.as_deref()).await))
}

/// POST /api/v1/wallet/connect
async fn wallet_connect(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<WalletView> {
    let wallet = state
        .wallets
        .connect(auth.user.id)
        .await
        .map_err(wallet_err)?;
    Ok(json_ok(wallet_view(Some(&wallet)).await))
}

/// POST /api/v1/wallet/disconnect
async fn wallet_disconnect(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<WalletView> {
    state
        .wallets
        .disconnect(auth.user.id)
        .await
        .map_err(wallet_err)?;
    Ok(json_ok(wallet_view(None).await))
}

/// POST /api/v1/wallet/refresh — re-read balances from the ledger.
async fn wallet_refresh(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> ApiResult<WalletView> {
    let wallet = state
        .wallets
        .connected(auth.user.id)
        .await
        .map_err(wallet_err)?;
    wallet.refresh_balances().await.map_err(wallet_err)?;
    Ok(json_ok(wallet_view(Some(&wallet)).await))
}

/// GET /api/v1/wallet/max/:asset — largest sendable amount.
async fn wallet_max(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Path(asset): Path<String>,
) -> ApiResult<AmountView> {
    let asset: Asset = asset.parse().map_err(|e: coinvoy_ledger::ValidationError| {
        json_err(StatusCode::BAD_REQUEST, &e.to_string())
    })?;
    let wallet = state
        .wallets
        .connected(auth.user.id)
        .await
        .map_err(wallet_err)?;
    let max = wallet.max_amount(asset).await.map_err(wallet_err)?;
    Ok(json_ok(AmountView {
        asset,
        amount: format_units(max, asset.decimals()),
    }))
}

/// POST /api/v1/wallet/estimate — network fee for a transfer, in SOL.
async fn wallet_estimate(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(request): Json<TransferRequest>,
) -> ApiResult<AmountView> {
    let wallet = state
        .wallets
        .connected(auth.user.id)
        .await
        .map_err(wallet_err)?;
    let fee = wallet.estimate_fee(&request).await.map_err(wallet_err)?;
    Ok(json_ok(AmountView {
        asset: Asset::Sol,
        amount: format_units(fee, Asset::Sol.decimals()),
    }))
}

/// POST /api/v1/wallet/transfer — build, sign, submit, confirm and record.
async fn wallet_transfer(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
    Json(request): Json<TransferRequest>,
) -> ApiResult<coinvoy_ledger::TransferReceipt> {
    let wallet = state
        .wallets
        .connected(auth.user.id)
        .await
        .map_err(wallet_err)?;
    let recorder = PgAttemptRecorder {
        pool: &state.pool,
        user_id: auth.user.id,
    };
    let receipt = wallet.send(&request, &recorder).await.map_err(wallet_err)?;
    Ok(json_ok(receipt))
}

// ─── Public Content ─────────────────────────────────────────────────────────

/// GET /api/v1/rates — USD, EUR and THB against USD.
async fn get_rates(State(state): State<Arc<AppState>>) -> ApiResult<Vec<rates::ExchangeRate>> {
    let rates = state.rates.fetch().await.map_err(|e| {
        tracing::warn!(error = %e, "Exchange rate fetch failed");
        json_err(StatusCode::BAD_GATEWAY, &e.to_string())
    })?;
    Ok(json_ok(rates))
}

/// GET /api/v1/catalog/countries
async fn list_countries() -> Json<ApiResponse<&'static [catalog::Country]>> {
    json_ok(&catalog::COUNTRIES[..])
}

/// GET /api/v1/catalog/fees
async fn list_fees() -> Json<ApiResponse<&'static [catalog::FeeQuote]>> {
    json_ok(&catalog::FEE_QUOTES[..])
}

/// GET /api/v1/preferences/language
async fn get_language(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Language>> {
    json_ok(state.preferences.language())
}

/// PUT /api/v1/preferences/language
async fn set_language(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LanguageBody>,
) -> ApiResult<Language> {
    state
        .preferences
        .set_language(body.language)
        .map_err(|e| json_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;
    Ok(json_ok(body.language))
}

/// POST /api/v1/contact — landing page contact form.
async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContactBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.email.contains('@') {
        return Err(json_err(StatusCode::BAD_REQUEST, "A valid email is required"));
    }
    let submission = NewContactSubmission {
        email: body.email.trim().to_string(),
        phone: body.phone.trim().to_string(),
        notes: body.notes,
    };
    let saved = storage::repos::insert_contact_submission(&state.pool, &submission)
        .await
        .map_err(db_err)?;
    tracing::info!(id = %saved.id, "Contact form submitted");
    Ok((StatusCode::CREATED, json_ok(saved.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coinvoy_ledger::{
        AttemptRecord, AttemptRecorder, ConfirmPolicy, ExternalSigner, Ledger, LedgerError, Pubkey,
        Signature, SignatureStatus, ValidationError,
    };
    use solana_sdk::{hash::Hash, message::Message, transaction::Transaction};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[test]
    fn wallet_errors_map_to_distinct_statuses() {
        let signature = Signature::new_unique();
        assert_eq!(
            wallet_status_code(&WalletError::Validation(ValidationError::NonPositiveAmount)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            wallet_status_code(&WalletError::AttemptInFlight),
            StatusCode::CONFLICT
        );
        assert_eq!(
            wallet_status_code(&WalletError::Signer(SignerError::Rejected("no".into()))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            wallet_status_code(&WalletError::Signer(SignerError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            wallet_status_code(&WalletError::ConfirmationTimedOut { signature }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            wallet_status_code(&WalletError::ConfirmationUnknown {
                signature,
                source: LedgerError::Rpc("503".into()),
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn auth_form_errors_are_bad_requests() {
        let (status, body) = auth_err(AuthError::PasswordMismatch);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.0.success);

        let (status, _) = auth_err(AuthError::Unauthorized("JWT expired".into()));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // ─── Per-user wallets ───────────────────────────────────────────────────

    /// Native balances per owner; every submitted transfer is confirmed.
    struct StaticLedger {
        native: HashMap<Pubkey, u64>,
    }

    #[async_trait]
    impl Ledger for StaticLedger {
        async fn native_balance(&self, owner: &Pubkey) -> Result<u64, LedgerError> {
            Ok(self.native.get(owner).copied().unwrap_or_default())
        }

        async fn token_account_balance(&self, _account: &Pubkey) -> Result<u64, LedgerError> {
            Err(LedgerError::Rpc("account not found".into()))
        }

        async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
            Ok(Hash::new_unique())
        }

        async fn fee_for_message(&self, _message: &Message) -> Result<u64, LedgerError> {
            Ok(5_000)
        }

        async fn signature_status(
            &self,
            _signature: &Signature,
            _search_history: bool,
        ) -> Result<SignatureStatus, LedgerError> {
            Ok(SignatureStatus::Confirmed)
        }
    }

    struct UserSigner {
        account: Pubkey,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ExternalSigner for UserSigner {
        async fn connect(&self) -> Result<Pubkey, SignerError> {
            Ok(self.account)
        }

        async fn disconnect(&self) -> Result<(), SignerError> {
            Ok(())
        }

        async fn sign_and_send(
            &self,
            _transaction: &Transaction,
        ) -> Result<Signature, SignerError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(Signature::new_unique())
        }
    }

    struct NoopRecorder;

    #[async_trait]
    impl AttemptRecorder for NoopRecorder {
        async fn record(&self, _attempt: &AttemptRecord) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn state_with(
        signers: HashMap<Uuid, Arc<UserSigner>>,
        native: &[(Pubkey, u64)],
    ) -> Arc<AppState> {
        let ledger = Arc::new(StaticLedger {
            native: native.iter().copied().collect(),
        });
        let factory: wallets::SignerFactory = Arc::new(move |user_id| {
            signers
                .get(&user_id)
                .cloned()
                .map(|s| s as Arc<dyn ExternalSigner>)
                .ok_or_else(|| SignerError::Unavailable("no wallet".into()))
        });
        let config = SessionConfig {
            native_reserve: 1_000_000,
            confirm: ConfirmPolicy {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
            },
        };
        Arc::new(AppState {
            pool: sqlx::PgPool::connect_lazy("postgres://localhost/coinvoy").unwrap(),
            auth: AuthClient::new("http://127.0.0.1:9", "anon"),
            wallets: WalletRegistry::new(ledger, factory, config),
            rates: RatesClient::new("http://127.0.0.1:9/rates"),
            preferences: Preferences::new(std::env::temp_dir().join("coinvoy-api-test.json")),
        })
    }

    fn caller(id: Uuid) -> Authenticated {
        Authenticated {
            user: AuthUser { id, email: None },
            token: "token".into(),
        }
    }

    fn sol_balance(view: &WalletView) -> &str {
        &view
            .balances
            .iter()
            .find(|b| b.asset == Asset::Sol)
            .unwrap()
            .amount
    }

    fn send_sol(to: &Pubkey, amount: &str) -> TransferRequest {
        TransferRequest {
            asset: Asset::Sol,
            recipient: to.to_string(),
            amount: amount.into(),
        }
    }

    #[tokio::test]
    async fn each_user_sees_only_their_own_wallet() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice_key, bob_key) = (Pubkey::new_unique(), Pubkey::new_unique());
        let signers = HashMap::from([
            (alice, Arc::new(UserSigner { account: alice_key, gate: None })),
            (bob, Arc::new(UserSigner { account: bob_key, gate: None })),
        ]);
        let native = [(alice_key, 2_000_000_000), (bob_key, 500_000_000)];
        let state = state_with(signers, &native);

        let view = wallet_connect(State(state.clone()), caller(alice))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(view.account, Some(alice_key.to_string()));
        assert_eq!(sol_balance(&view), "2");

        let view = wallet_status(State(state.clone()), caller(bob)).await.unwrap().0.data;
        assert_eq!(view.account, None);
        assert!(view.balances.is_empty());
        let (status, _) = wallet_refresh(State(state.clone()), caller(bob)).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);

        let view = wallet_connect(State(state.clone()), caller(bob))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(view.account, Some(bob_key.to_string()));
        assert_eq!(sol_balance(&view), "0.5");

        let max = wallet_max(State(state.clone()), caller(alice), Path("sol".into()))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(max.amount, "1.999");
        let max = wallet_max(State(state.clone()), caller(bob), Path("sol".into()))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(max.amount, "0.499");

        wallet_disconnect(State(state.clone()), caller(alice)).await.unwrap();
        let view = wallet_status(State(state.clone()), caller(alice)).await.unwrap().0.data;
        assert_eq!(view.account, None);
        let view = wallet_status(State(state.clone()), caller(bob)).await.unwrap().0.data;
        assert_eq!(view.account, Some(bob_key.to_string()));

        state.wallets.remove(bob).await;
        assert!(state.wallets.get(bob).await.is_none());
    }

    #[tokio::test]
    async fn one_users_transfer_does_not_gate_another() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice_key, bob_key) = (Pubkey::new_unique(), Pubkey::new_unique());
        let release = Arc::new(Notify::new());
        let signers = HashMap::from([
            (
                alice,
                Arc::new(UserSigner {
                    account: alice_key,
                    gate: Some(release.clone()),
                }),
            ),
            (bob, Arc::new(UserSigner { account: bob_key, gate: None })),
        ]);
        let native = [(alice_key, 2_000_000_000), (bob_key, 2_000_000_000)];
        let state = state_with(signers, &native);
        wallet_connect(State(state.clone()), caller(alice)).await.unwrap();
        wallet_connect(State(state.clone()), caller(bob)).await.unwrap();
        let to = Pubkey::new_unique();

        let alice_wallet = state.wallets.connected(alice).await.unwrap();
        let pending = {
            let wallet = alice_wallet.clone();
            let req = send_sol(&to, "1");
            tokio::spawn(async move { wallet.send(&req, &NoopRecorder).await })
        };
        while !alice_wallet.is_in_flight() {
            tokio::task::yield_now().await;
        }

        let view = wallet_status(State(state.clone()), caller(alice)).await.unwrap().0.data;
        assert!(view.in_flight);
        let view = wallet_status(State(state.clone()), caller(bob)).await.unwrap().0.data;
        assert!(!view.in_flight);

        let bob_wallet = state.wallets.connected(bob).await.unwrap();
        bob_wallet.send(&send_sol(&to, "0.5"), &NoopRecorder).await.unwrap();

        let err = alice_wallet
            .send(&send_sol(&to, "0.5"), &NoopRecorder)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::AttemptInFlight));

        release.notify_one();
        pending.await.unwrap().unwrap();
        assert!(!alice_wallet.is_in_flight());
    }
}
