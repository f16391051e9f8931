use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use super::{Identity, JwtError, JwtKeys};
use crate::config::BackendConfig;

/// Errors from the auth provider
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    Expired,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Account already registered")]
    AlreadyRegistered,

    #[error("Rejected by auth provider: {0}")]
    Rejected(String),

    #[error("Auth provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Auth provider error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Failures of the provider itself rather than of the presented credential.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AuthError::Upstream(_) | AuthError::Http(_) | AuthError::NotConfigured(_)
        )
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            other => AuthError::InvalidSession(other.to_string()),
        }
    }
}

/// Tokens issued by a successful sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: Identity,
}

/// The identity gateway's view of the auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Validate an access token and return the user it belongs to.
    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserResponse,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            user: token.user.into(),
        }
    }
}

/// Sign-up answers with a session when confirmation is off, a bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

/// Client for the hosted auth REST API (`/auth/v1/*`).
pub struct HostedAuth {
    client: reqwest::Client,
    base_url: Url,
    anon_key: String,
    service_role_key: Option<String>,
    local_keys: Option<JwtKeys>,
}

impl HostedAuth {
    pub fn from_config(config: &BackendConfig) -> Result<Self, AuthError> {
        let raw = config.url.as_deref().ok_or(AuthError::NotConfigured("BACKEND_URL"))?;
        let anon_key = config
            .anon_key
            .clone()
            .ok_or(AuthError::NotConfigured("BACKEND_ANON_KEY"))?;

        let mut base_url = Url::parse(raw).map_err(|_| AuthError::NotConfigured("BACKEND_URL"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        // Verifying locally skips a provider round-trip on every request.
        let local_keys = match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Some(JwtKeys::from_secret(secret)?),
            _ => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            anon_key,
            service_role_key: config.service_role_key.clone(),
            local_keys,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::Upstream(format!("invalid auth endpoint '{}': {}", path, e)))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<TokenResponse>().await?.into()),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let message = error_message(response).await;
                tracing::debug!(grant_type, %message, "Token grant rejected");
                if grant_type == "password" {
                    Err(AuthError::InvalidCredentials)
                } else {
                    Err(AuthError::InvalidSession(message))
                }
            }
            status => Err(upstream(status, response).await),
        }
    }

    /// Create a confirmed user through the admin API. Needs the service role key.
    pub async fn admin_create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let service_key = self
            .service_role_key
            .as_deref()
            .ok_or(AuthError::NotConfigured("BACKEND_SERVICE_ROLE_KEY"))?;

        let response = self
            .client
            .post(self.endpoint("auth/v1/admin/users")?)
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .json(&json!({ "email": email, "password": password, "email_confirm": true }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<UserResponse>().await?.into()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(classify_rejection(error_message(response).await))
            }
            status => Err(upstream(status, response).await),
        }
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        if let Some(keys) = &self.local_keys {
            return Ok(keys.verify(access_token)?.into());
        }

        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<UserResponse>().await?.into()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidSession(error_message(response).await))
            }
            status => Err(upstream(status, response).await),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => match response.json::<SignUpResponse>().await? {
                SignUpResponse::Session(token) => Ok(token.user.into()),
                SignUpResponse::User(user) => Ok(user.into()),
            },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(classify_rejection(error_message(response).await))
            }
            status => Err(upstream(status, response).await),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            // An already-invalid session is as good as signed out.
            status if status.is_success() || status == StatusCode::UNAUTHORIZED => Ok(()),
            status => Err(upstream(status, response).await),
        }
    }
}

fn classify_rejection(message: String) -> AuthError {
    if message.to_ascii_lowercase().contains("already") {
        AuthError::AlreadyRegistered
    } else {
        AuthError::Rejected(message)
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

async fn upstream(status: StatusCode, response: reqwest::Response) -> AuthError {
    AuthError::Upstream(format!("{}: {}", status, error_message(response).await))
}
