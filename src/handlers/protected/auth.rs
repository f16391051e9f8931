// handlers/protected/auth.rs - GET /api/auth/me, POST /api/auth/logout

use axum::{extract::State, http::HeaderMap};
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::session::{append_cookies, cleared_cookies};
use crate::auth::Identity;
use crate::database::models::Profile;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: Identity,
    pub profile: Option<Profile>,
    pub is_admin: bool,
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Me> {
    let profile = state.store.get_profile(user.id()).await?;
    let is_admin = profile.as_ref().is_some_and(Profile::is_privileged);
    Ok(ApiResponse::success(Me {
        user: user.identity,
        profile,
        is_admin,
    }))
}

/// Cookies are cleared even when the provider call fails.
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<(HeaderMap, ApiResponse<Value>), ApiError> {
    if let Err(e) = state.auth.sign_out(&user.access_token).await {
        if e.is_upstream() {
            tracing::error!(user_id = %user.id(), "Sign-out failed upstream: {}", e);
        } else {
            tracing::debug!(user_id = %user.id(), "Sign-out on stale session: {}", e);
        }
    }

    let mut headers = HeaderMap::new();
    append_cookies(&mut headers, cleared_cookies(&state.config.session));
    tracing::info!(user_id = %user.id(), "User signed out");
    Ok((headers, ApiResponse::success(json!({ "signed_out": true }))))
}
