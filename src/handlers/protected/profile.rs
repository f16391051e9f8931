// handlers/protected/profile.rs - Own expert/organization profile, public expert view

use axum::extract::{Path, State};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{
    ExpertProfile, ExpertProfileInput, OrganizationProfile, OrganizationProfileInput,
};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::types::Role;
use crate::validation::Validator;

pub async fn get_expert_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<ExpertProfile> {
    let profile = state
        .store
        .get_expert_profile(user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("Expert profile not found"))?;
    Ok(ApiResponse::success(profile))
}

pub async fn put_expert_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(input): JsonBody<ExpertProfileInput>,
) -> ApiResult<ExpertProfile> {
    user.require_role(&state, Role::Expert).await?;

    let mut v = Validator::new();
    v.required("headline", &input.headline)
        .max_len("headline", &input.headline, 160)
        .non_negative("hourly_rate", input.hourly_rate);
    if input.years_experience.is_some_and(|y| y < 0) {
        v.add("years_experience", "Must not be negative");
    }
    if input.skills.iter().any(|s| s.trim().is_empty()) {
        v.add("skills", "Skills must not be blank");
    }
    v.finish("Invalid expert profile")?;

    let saved = state.store.upsert_expert_profile(user.id(), &input).await?;
    tracing::debug!(user_id = %user.id(), "Expert profile saved");
    Ok(ApiResponse::success(saved))
}

pub async fn get_organization_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<OrganizationProfile> {
    let profile = state
        .store
        .get_organization_profile(user.id())
        .await?
        .ok_or_else(|| ApiError::not_found("Organization profile not found"))?;
    Ok(ApiResponse::success(profile))
}

pub async fn put_organization_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(input): JsonBody<OrganizationProfileInput>,
) -> ApiResult<OrganizationProfile> {
    user.require_role(&state, Role::Organization).await?;

    let mut v = Validator::new();
    v.required("name", &input.name).max_len("name", &input.name, 160);
    if let Some(website) = input.website.as_deref() {
        if !(website.starts_with("http://") || website.starts_with("https://")) {
            v.add("website", "Must start with http:// or https://");
        }
    }
    v.finish("Invalid organization profile")?;

    let saved = state.store.upsert_organization_profile(user.id(), &input).await?;
    tracing::debug!(user_id = %user.id(), "Organization profile saved");
    Ok(ApiResponse::success(saved))
}

/// What any signed-in user may see about an expert. No email.
#[derive(Debug, Serialize)]
pub struct ExpertView {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub expert: Option<ExpertProfile>,
}

pub async fn show_expert(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ExpertView> {
    let profile = state
        .store
        .get_profile(id)
        .await?
        .filter(|p| p.role == Role::Expert)
        .ok_or_else(|| ApiError::not_found("Expert not found"))?;
    let expert = state.store.get_expert_profile(id).await?;

    Ok(ApiResponse::success(ExpertView {
        id: profile.id,
        full_name: profile.full_name,
        expert,
    }))
}
