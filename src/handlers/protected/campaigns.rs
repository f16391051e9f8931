// handlers/protected/campaigns.rs - /api/campaigns[/:id]

use axum::extract::{Path, Query, State};
use uuid::Uuid;

use super::{ensure_owner, load_campaign, visible_to};
use crate::app::AppState;
use crate::database::models::{
    Campaign, CampaignFilter, CampaignUpdate, DraftVisibility, NewCampaign, PageQuery,
};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::types::{CampaignStatus, Role};
use crate::validation::Validator;

const TITLE_MAX: usize = 200;

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(mut filter): Query<CampaignFilter>,
) -> ApiResult<Vec<Campaign>> {
    let page = PageQuery {
        limit: filter.limit,
        offset: filter.offset,
    }
    .to_page(state.config.api.default_page_size, state.config.api.max_page_size);

    // Visibility goes into the query so hidden drafts never take page slots.
    let profile = state.store.get_profile(user.id()).await?;
    filter.drafts = match profile {
        Some(p) if p.is_privileged() => DraftVisibility::All,
        _ => DraftVisibility::OwnedBy(user.id()),
    };
    let campaigns = state.store.list_campaigns(&filter, page).await?;
    Ok(ApiResponse::success(campaigns))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(input): JsonBody<NewCampaign>,
) -> ApiResult<Campaign> {
    let profile = user.require_role(&state, Role::Organization).await?;

    let mut v = Validator::new();
    v.required("title", &input.title)
        .max_len("title", &input.title, TITLE_MAX)
        .required("description", &input.description)
        .non_negative("budget", input.budget);
    if input
        .status
        .is_some_and(|s| !matches!(s, CampaignStatus::Draft | CampaignStatus::Open))
    {
        v.add("status", "New campaigns must be draft or open");
    }
    v.finish("Invalid campaign")?;

    let campaign = state.store.create_campaign(profile.id, &input).await?;
    tracing::info!(campaign_id = %campaign.id, organization_id = %profile.id, "Campaign created");
    Ok(ApiResponse::created(campaign))
}

pub async fn show(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    let campaign = load_campaign(&state, id).await?;
    let profile = state.store.get_profile(user.id()).await?;
    if !visible_to(profile.as_ref(), &campaign) {
        return Err(ApiError::not_found("Campaign not found"));
    }
    Ok(ApiResponse::success(campaign))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<CampaignUpdate>,
) -> ApiResult<Campaign> {
    let profile = user.profile(&state).await?;
    let campaign = load_campaign(&state, id).await?;
    ensure_owner(&profile, &campaign)?;

    if campaign.status.is_terminal() {
        return Err(ApiError::conflict(format!(
            "Campaign is {} and can no longer change",
            campaign.status
        )));
    }
    if let Some(next) = update.status.filter(|s| *s != campaign.status) {
        if !campaign.status.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Cannot move campaign from {} to {}",
                campaign.status, next
            )));
        }
    }

    let mut v = Validator::new();
    v.required_opt("title", update.title.as_deref())
        .required_opt("description", update.description.as_deref())
        .non_negative("budget", update.budget);
    if let Some(title) = update.title.as_deref() {
        v.max_len("title", title, TITLE_MAX);
    }
    v.finish("Invalid campaign update")?;

    let updated = state.store.update_campaign(id, &update).await?;
    if updated.status != campaign.status {
        tracing::info!(
            campaign_id = %id,
            from = %campaign.status,
            to = %updated.status,
            "Campaign status changed"
        );
    }
    Ok(ApiResponse::success(updated))
}
