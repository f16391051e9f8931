use async_trait::async_trait;
use chrono::Duration;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::provider::{AuthError, AuthProvider, Session};
use super::{Claims, Identity, JwtKeys};
use crate::config::AppConfig;

struct LocalAccount {
    identity: Identity,
    salt: String,
    password_hash: String,
}

/// In-process auth provider for development and tests.
///
/// Issues the same HS256 access tokens the hosted provider does, so
/// everything downstream of the gateway behaves identically.
pub struct LocalAuth {
    keys: JwtKeys,
    access_ttl: Duration,
    accounts: RwLock<HashMap<String, LocalAccount>>,
    refresh_tokens: RwLock<HashMap<String, Uuid>>,
}

impl LocalAuth {
    pub fn new(keys: JwtKeys, access_ttl: Duration) -> Self {
        Self {
            keys,
            access_ttl,
            accounts: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let secret = config
            .backend
            .jwt_secret
            .as_deref()
            .ok_or(AuthError::NotConfigured("BACKEND_JWT_SECRET"))?;
        Ok(Self::new(
            JwtKeys::from_secret(secret)?,
            Duration::seconds(config.session.local_token_ttl_secs),
        ))
    }

    /// Register an account, returning its new identity.
    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let key = email.trim().to_ascii_lowercase();
        if key.is_empty() || password.len() < 6 {
            return Err(AuthError::Rejected(
                "Email and a password of at least 6 characters are required".to_string(),
            ));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered);
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
        };
        let salt = Uuid::new_v4().simple().to_string();
        let password_hash = hash_password(&salt, password);
        accounts.insert(
            key,
            LocalAccount {
                identity: identity.clone(),
                salt,
                password_hash,
            },
        );

        tracing::debug!(user_id = %identity.id, "Registered local account");
        Ok(identity)
    }

    /// Mint an access token without a password round-trip.
    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, AuthError> {
        self.keys
            .issue(&Claims::new(identity, self.access_ttl))
            .map_err(|e| AuthError::Upstream(e.to_string()))
    }

    async fn start_session(&self, identity: Identity) -> Result<Session, AuthError> {
        let access_token = self.issue_access_token(&identity)?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.refresh_tokens
            .write()
            .await
            .insert(refresh_token.clone(), identity.id);

        Ok(Session {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            user: identity,
        })
    }

    async fn identity_by_id(&self, id: Uuid) -> Option<Identity> {
        self.accounts
            .read()
            .await
            .values()
            .find(|account| account.identity.id == id)
            .map(|account| account.identity.clone())
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let identity: Identity = self.keys.verify(access_token)?.into();
        // Tokens outlive deleted accounts otherwise.
        self.identity_by_id(identity.id)
            .await
            .ok_or_else(|| AuthError::InvalidSession("unknown user".to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.register(email, password).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let identity = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(&email.trim().to_ascii_lowercase())
                .ok_or(AuthError::InvalidCredentials)?;
            if hash_password(&account.salt, password) != account.password_hash {
                return Err(AuthError::InvalidCredentials);
            }
            account.identity.clone()
        };
        self.start_session(identity).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        // Refresh tokens are single use.
        let user_id = self
            .refresh_tokens
            .write()
            .await
            .remove(refresh_token)
            .ok_or_else(|| AuthError::InvalidSession("unknown refresh token".to_string()))?;
        let identity = self
            .identity_by_id(user_id)
            .await
            .ok_or_else(|| AuthError::InvalidSession("unknown user".to_string()))?;
        self.start_session(identity).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let identity = self.get_user(access_token).await?;
        self.refresh_tokens
            .write()
            .await
            .retain(|_, user_id| *user_id != identity.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalAuth {
        LocalAuth::new(JwtKeys::from_secret("local-secret").unwrap(), Duration::minutes(5))
    }

    #[tokio::test]
    async fn sign_in_issues_verifiable_session() {
        let auth = provider();
        let who = auth.register("Grace@Example.com", "hunter22").await.unwrap();

        let session = auth.sign_in_with_password("grace@example.com", "hunter22").await.unwrap();
        assert_eq!(session.user, who);
        assert_eq!(auth.get_user(&session.access_token).await.unwrap(), who);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicates_are_rejected() {
        let auth = provider();
        auth.register("a@example.com", "secret1").await.unwrap();
        assert!(matches!(
            auth.sign_in_with_password("a@example.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.register("A@example.com", "secret2").await,
            Err(AuthError::AlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_rotate_and_die_on_sign_out() {
        let auth = provider();
        auth.register("b@example.com", "secret1").await.unwrap();
        let first = auth.sign_in_with_password("b@example.com", "secret1").await.unwrap();

        let second = auth.refresh_session(&first.refresh_token).await.unwrap();
        assert!(auth.refresh_session(&first.refresh_token).await.is_err());

        auth.sign_out(&second.access_token).await.unwrap();
        assert!(auth.refresh_session(&second.refresh_token).await.is_err());
    }
}
