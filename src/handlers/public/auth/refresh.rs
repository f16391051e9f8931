// handlers/public/auth/refresh.rs - POST /api/auth/refresh
//
// Takes the refresh token from the body or, failing that, the refresh cookie.

use axum::{extract::State, http::HeaderMap};
use serde::Deserialize;

use super::{cookie_headers, SessionBody};
use crate::app::AppState;
use crate::auth::SessionCredentials;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<axum::Json<RefreshRequest>>,
) -> Result<(HeaderMap, ApiResponse<SessionBody>), ApiError> {
    let from_body = body.and_then(|axum::Json(b)| b.refresh_token).filter(|t| !t.is_empty());
    let refresh_token = from_body
        .or_else(|| SessionCredentials::from_headers(&headers, &state.config.session).refresh_token)
        .ok_or_else(ApiError::unauthorized)?;

    let session = state.auth.refresh_session(&refresh_token).await?;
    let profile = state.store.get_profile(session.user.id).await?;

    let cookies = cookie_headers(&session, &state.config.session);
    Ok((cookies, ApiResponse::success(SessionBody::new(session, profile))))
}
