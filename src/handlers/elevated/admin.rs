// handlers/elevated/admin.rs - /api/admin/{stats,users,logs}

use axum::extract::{Path, Query, State};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    AdminLog, NewAdminLog, PageQuery, PlatformStats, PrivilegeUpdate, Profile,
};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{AdminUser, ApiResponse, ApiResult};
use crate::types::Role;

pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<PlatformStats> {
    Ok(ApiResponse::success(state.store.platform_stats().await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<Profile>> {
    let page = query.to_page(state.config.api.default_page_size, state.config.api.max_page_size);
    Ok(ApiResponse::success(state.store.list_profiles(page).await?))
}

pub async fn list_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<AdminLog>> {
    let page = query.to_page(state.config.api.default_page_size, state.config.api.max_page_size);
    Ok(ApiResponse::success(state.store.list_admin_logs(page).await?))
}

/// Set a user's role and/or admin flag. Every change is written to the
/// admin log and the `audit` tracing target.
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<PrivilegeUpdate>,
) -> ApiResult<Profile> {
    if update.is_empty() {
        return Err(ApiError::bad_request("Provide role and/or is_admin"));
    }

    let before = state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let stays_privileged = update.is_admin.unwrap_or(before.is_admin)
        || update.role.unwrap_or(before.role) == Role::Admin;
    if id == admin.id && !stays_privileged {
        return Err(ApiError::bad_request("Admins cannot remove their own admin access"));
    }
    let after = state.store.update_privileges(id, &update).await?;

    let entry = NewAdminLog {
        admin_id: Some(admin.id),
        action: "update_user_privileges".to_string(),
        target_type: "profile".to_string(),
        target_id: Some(id),
        details: json!({
            "before": { "role": before.role, "is_admin": before.is_admin },
            "after": { "role": after.role, "is_admin": after.is_admin },
        }),
    };
    state.store.record_admin_action(&entry).await?;

    tracing::info!(
        target: "audit",
        admin_id = %admin.id,
        user_id = %id,
        role = %after.role,
        is_admin = after.is_admin,
        "User privileges updated"
    );
    Ok(ApiResponse::success(after))
}
