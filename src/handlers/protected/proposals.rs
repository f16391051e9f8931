// handlers/protected/proposals.rs - Proposals on campaigns and their status flow

use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use super::{ensure_owner, load_campaign};
use crate::app::AppState;
use crate::database::models::{Campaign, NewNotification, NewProposal, Proposal};
use crate::error::{ApiError, JsonBody};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::types::{ProposalStatus, Role};
use crate::validation::Validator;

pub async fn list_for_campaign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Vec<Proposal>> {
    let profile = user.profile(&state).await?;
    let campaign = load_campaign(&state, campaign_id).await?;
    ensure_owner(&profile, &campaign)?;

    let proposals = state.store.list_proposals_for_campaign(campaign_id).await?;
    Ok(ApiResponse::success(proposals))
}

pub async fn list_own(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<Proposal>> {
    let proposals = state.store.list_proposals_for_expert(user.id()).await?;
    Ok(ApiResponse::success(proposals))
}

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(campaign_id): Path<Uuid>,
    JsonBody(input): JsonBody<NewProposal>,
) -> ApiResult<Proposal> {
    let expert = user.require_role(&state, Role::Expert).await?;
    let campaign = load_campaign(&state, campaign_id).await?;
    if !campaign.status.accepts_proposals() {
        return Err(ApiError::conflict("Campaign is not accepting proposals"));
    }

    let mut v = Validator::new();
    v.required("cover_letter", &input.cover_letter)
        .max_len("cover_letter", &input.cover_letter, 5000)
        .non_negative("proposed_rate", input.proposed_rate);
    v.finish("Invalid proposal")?;

    let proposal = state
        .store
        .create_proposal(campaign_id, expert.id, &input)
        .await
        .map_err(|e| match e {
            crate::database::StoreError::Conflict(_) => {
                ApiError::conflict("You already submitted a proposal for this campaign")
            }
            other => other.into(),
        })?;
    tracing::info!(
        proposal_id = %proposal.id,
        %campaign_id,
        expert_id = %expert.id,
        "Proposal submitted"
    );

    let who = expert.full_name.as_deref().unwrap_or("An expert");
    inform(
        &state,
        campaign.organization_id,
        "proposal_received",
        "New proposal",
        format!("{} applied to \"{}\"", who, campaign.title),
        format!("/api/campaigns/{}/proposals", campaign.id),
    )
    .await;

    Ok(ApiResponse::created(proposal))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ProposalStatus,
}

/// Organizations accept or reject; experts withdraw. Each change notifies
/// the other party.
pub async fn set_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<Proposal> {
    let proposal = state
        .store
        .get_proposal(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Proposal not found"))?;
    let campaign = load_campaign(&state, proposal.campaign_id).await?;

    let next = change.status;
    let is_organization = campaign.organization_id == user.id();
    let is_expert = proposal.expert_id == user.id();
    if !is_organization && !is_expert {
        return Err(ApiError::forbidden("You are not a party to this proposal"));
    }
    if !proposal.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot move proposal from {} to {}",
            proposal.status, next
        )));
    }
    let allowed = if next.decided_by_organization() { is_organization } else { is_expert };
    if !allowed {
        return Err(ApiError::forbidden("You cannot set this proposal status"));
    }

    let updated = state.store.set_proposal_status(id, next).await?;
    tracing::info!(
        proposal_id = %id,
        from = %proposal.status,
        to = %next,
        "Proposal status changed"
    );

    notify_other_party(&state, &campaign, &updated).await;
    Ok(ApiResponse::success(updated))
}

async fn notify_other_party(state: &AppState, campaign: &Campaign, proposal: &Proposal) {
    let (recipient, kind, title, message) = match proposal.status {
        ProposalStatus::Accepted => (
            proposal.expert_id,
            "proposal_accepted",
            "Proposal accepted",
            format!("Your proposal for \"{}\" was accepted", campaign.title),
        ),
        ProposalStatus::Rejected => (
            proposal.expert_id,
            "proposal_rejected",
            "Proposal declined",
            format!("Your proposal for \"{}\" was declined", campaign.title),
        ),
        ProposalStatus::Withdrawn => (
            campaign.organization_id,
            "proposal_withdrawn",
            "Proposal withdrawn",
            format!("An expert withdrew their proposal for \"{}\"", campaign.title),
        ),
        ProposalStatus::Pending => return,
    };
    let link = match proposal.status {
        ProposalStatus::Withdrawn => format!("/api/campaigns/{}/proposals", campaign.id),
        _ => "/api/proposals".to_string(),
    };
    inform(state, recipient, kind, title, message, link).await;
}

/// In-app notification plus email when the integration is configured.
async fn inform(
    state: &AppState,
    recipient: Uuid,
    kind: &str,
    title: &str,
    message: String,
    link: String,
) {
    state
        .notifications
        .notify_quietly(NewNotification {
            user_id: recipient,
            kind: kind.to_string(),
            title: title.to_string(),
            message: message.clone(),
            link: Some(link),
        })
        .await;

    if !state.mailer.is_enabled() {
        return;
    }
    match state.store.get_profile(recipient).await {
        Ok(Some(profile)) => state
            .mailer
            .send_in_background(profile.email, title.to_string(), message),
        Ok(None) => tracing::debug!(%recipient, "No profile to email"),
        Err(e) => tracing::warn!(%recipient, "Could not load email recipient: {}", e),
    }
}
