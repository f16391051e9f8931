// handlers/public/auth/register.rs - POST /api/auth/register
//
// Creates the account with the auth provider, then the matching profile row.
// Admin is never self-assignable.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::Identity;
use crate::database::models::{NewNotification, NewProfile, Profile};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Role;
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub user: Identity,
    pub profile: Profile,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> ApiResult<Registered> {
    let email = body.email.trim().to_ascii_lowercase();

    let mut v = Validator::new();
    v.required("email", &email).email("email", &email);
    if body.password.len() < 6 {
        v.add("password", "Must be at least 6 characters");
    }
    v.required_opt("full_name", body.full_name.as_deref());
    if body.role == Role::Admin {
        v.add("role", "Must be expert or organization");
    }
    v.finish("Invalid registration")?;

    let user = state.auth.sign_up(&email, &body.password).await?;
    let profile = state
        .store
        .create_profile(&NewProfile {
            id: user.id,
            email: email.clone(),
            full_name: body.full_name.map(|n| n.trim().to_string()),
            role: body.role,
            is_admin: false,
        })
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, "Account created but profile insert failed: {}", e);
            ApiError::from(e)
        })?;

    state
        .notifications
        .notify_quietly(NewNotification {
            user_id: user.id,
            kind: "welcome".to_string(),
            title: "Welcome to Expert Match".to_string(),
            message: match body.role {
                Role::Organization => {
                    "Create your first campaign to start receiving proposals.".to_string()
                }
                _ => "Complete your expert profile so organizations can find you.".to_string(),
            },
            link: Some(match body.role {
                Role::Organization => "/api/profile/organization".to_string(),
                _ => "/api/profile/expert".to_string(),
            }),
        })
        .await;

    tracing::info!(user_id = %user.id, role = %profile.role, "User registered");
    Ok(ApiResponse::created(Registered { user, profile }))
}
