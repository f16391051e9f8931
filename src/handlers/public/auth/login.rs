// handlers/public/auth/login.rs - POST /api/auth/login

use axum::{extract::State, http::HeaderMap};
use serde::Deserialize;

use super::{cookie_headers, SessionBody};
use crate::app::AppState;
use crate::error::{ApiError, JsonBody};
use crate::middleware::ApiResponse;
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<(HeaderMap, ApiResponse<SessionBody>), ApiError> {
    let mut v = Validator::new();
    v.required("email", &body.email).required("password", &body.password);
    v.finish("Email and password are required")?;

    let email = body.email.trim();
    let session = state
        .auth
        .sign_in_with_password(email, &body.password)
        .await
        .map_err(|e| {
            tracing::info!(%email, "Sign-in failed: {}", e);
            ApiError::from(e)
        })?;

    let profile = state.store.get_profile(session.user.id).await?;
    tracing::info!(user_id = %session.user.id, "User signed in");

    let headers = cookie_headers(&session, &state.config.session);
    Ok((headers, ApiResponse::success(SessionBody::new(session, profile))))
}
