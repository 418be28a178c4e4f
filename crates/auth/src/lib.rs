//! Client for the hosted auth service: email/password sign-up and sign-in,
//! bearer-token lookup, and a watchable signed-in state.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password must be at least 6 characters")]
    PasswordTooShort,

    #[error("email is required")]
    MissingEmail,

    /// Bad credentials, expired or unknown token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The service answered with an error message of its own.
    #[error("auth service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// Result of a sign-up. The service only returns a session when email
/// confirmation is disabled.
#[derive(Debug, Clone, Serialize)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn(AuthUser),
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Sign-up answers either with a bare user or with a session wrapping one.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession(Session),
    UserOnly(AuthUser),
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .unwrap_or_else(|| status.to_string())
    }
}

/// Checks the sign-up form before anything is sent.
pub fn validate_sign_up(email: &str, password: &str, confirm: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::MissingEmail);
    }
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

pub struct AuthClient {
    http: Client,
    base_url: String,
    anon_key: String,
    state: watch::Sender<AuthState>,
}

impl AuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            state,
        }
    }

    /// Watch sign-in / sign-out transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<SignUp, AuthError> {
        validate_sign_up(email, password, confirm)?;

        let response = self
            .request(reqwest::Method::POST, "/auth/v1/signup")
            .json(&Credentials { email, password })
            .send()
            .await?;
        let body: SignUpResponse = read_json(response).await?;

        let signup = match body {
            SignUpResponse::WithSession(session) => {
                self.state.send_replace(AuthState::SignedIn(session.user.clone()));
                SignUp {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            SignUpResponse::UserOnly(user) => SignUp {
                user,
                session: None,
            },
        };
        tracing::info!(user = %signup.user.id, "Account created");
        Ok(signup)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/auth/v1/token?grant_type=password")
            .json(&Credentials { email, password })
            .send()
            .await?;
        let session: Session = read_json(response).await?;

        tracing::info!(user = %session.user.id, "Signed in");
        self.state.send_replace(AuthState::SignedIn(session.user.clone()));
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/auth/v1/logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        check_status(response).await?;

        tracing::info!("Signed out");
        self.state.send_replace(AuthState::SignedOut);
        Ok(())
    }

    /// Resolve an access token to its user.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .request(reqwest::Method::GET, "/auth/v1/user")
            .bearer_auth(access_token)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .unwrap_or_default()
        .into_message(status);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::Unauthorized(message),
        // Wrong email/password comes back as 400 invalid_grant.
        StatusCode::BAD_REQUEST if message.to_lowercase().contains("invalid login") => {
            AuthError::Unauthorized(message)
        }
        _ => AuthError::Service {
            status: status.as_u16(),
            message,
        },
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AuthError> {
    Ok(check_status(response).await?.json().await?)
}
