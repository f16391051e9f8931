pub mod guard;
pub mod local;
pub mod provider;
pub mod session;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use guard::{authorize_admin, AdminDecision, AdminIdentity, DenyReason, PerimeterDecision};
pub use local::LocalAuth;
pub use provider::{AuthError, AuthProvider, HostedAuth, Session};
pub use session::SessionCredentials;

/// Audience the auth provider stamps on user access tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// A user whose session the auth provider has validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: Option<String>,
    pub aud: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(identity: &Identity, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.id,
            email: identity.email.clone(),
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            role: AUTHENTICATED_AUDIENCE.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("JWT expired")]
    Expired,

    #[error("Invalid JWT: {0}")]
    Invalid(String),
}

/// HS256 keys shared with the auth provider.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: Some("ada@example.com".to_string()),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::from_secret("test-secret").unwrap();
        let who = identity();
        let token = keys.issue(&Claims::new(&who, Duration::minutes(5))).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(Identity::from(claims), who);
    }

    #[test]
    fn expired_tokens_are_distinguished() {
        let keys = JwtKeys::from_secret("test-secret").unwrap();
        let token = keys.issue(&Claims::new(&identity(), Duration::hours(-2))).unwrap();
        assert_eq!(keys.verify(&token).unwrap_err(), JwtError::Expired);
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let ours = JwtKeys::from_secret("ours").unwrap();
        let theirs = JwtKeys::from_secret("theirs").unwrap();
        let token = theirs.issue(&Claims::new(&identity(), Duration::minutes(5))).unwrap();
        assert!(matches!(ours.verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(JwtKeys::from_secret(""), Err(JwtError::InvalidSecret)));
    }
}
