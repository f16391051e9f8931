use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::gateway::AccessToken;
use crate::app::AppState;
use crate::auth::{
    authorize_admin, AdminDecision, AdminIdentity, Identity, PerimeterDecision, SessionCredentials,
};
use crate::database::models::Profile;
use crate::error::ApiError;
use crate::types::Role;

/// A caller with a session the gateway validated.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub identity: Identity,
    pub access_token: String,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    /// Load the caller's profile; callers without one cannot act on the platform.
    pub async fn profile(&self, state: &AppState) -> Result<Profile, ApiError> {
        state
            .store
            .get_profile(self.id())
            .await?
            .ok_or_else(|| ApiError::forbidden("Profile required"))
    }

    /// Load the profile and require a role. Admins pass every role check.
    pub async fn require_role(&self, state: &AppState, role: Role) -> Result<Profile, ApiError> {
        let profile = self.profile(state).await?;
        if profile.role == role || profile.is_privileged() {
            Ok(profile)
        } else {
            Err(ApiError::forbidden(format!("Only {} accounts can do this", role)))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)?;
        let access_token = parts
            .extensions
            .get::<AccessToken>()
            .map(|t| t.0.clone())
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { identity, access_token })
    }
}

/// A caller the authorization guard let onto an admin-restricted route.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AdminIdentity);

/// Run the guard for a request. Shared by the admin API and the dashboard page.
pub async fn admin_decision(parts: &Parts, state: &AppState) -> AdminDecision {
    let decision = PerimeterDecision::from_headers(&parts.headers);
    let credential = parts
        .extensions
        .get::<AccessToken>()
        .map(|t| t.0.clone())
        .or_else(|| {
            SessionCredentials::from_headers(&parts.headers, &state.config.session).access_token
        });

    authorize_admin(
        decision,
        credential.as_deref(),
        state.auth.as_ref(),
        state.store.as_ref(),
    )
    .await
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match admin_decision(parts, state).await {
            AdminDecision::Authorized(admin) => Ok(AdminUser(admin)),
            AdminDecision::Denied(reason) => {
                tracing::info!(path = %parts.uri.path(), ?reason, "Admin access denied");
                Err(ApiError::unauthorized())
            }
        }
    }
}
