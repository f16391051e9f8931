// handlers/protected/mod.rs - Protected handlers (validated session required)
//
// Every handler here takes `CurrentUser`, which rejects with 401 when the
// gateway found no valid session. Ownership and role checks are per handler
// and answer 403.

pub mod auth;
pub mod campaigns;
pub mod notifications;
pub mod profile;
pub mod proposals;
pub mod tasks;

use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Campaign, Profile};
use crate::error::ApiError;
use crate::types::ProposalStatus;

pub(crate) async fn load_campaign(state: &AppState, id: Uuid) -> Result<Campaign, ApiError> {
    state
        .store
        .get_campaign(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

pub(crate) fn ensure_owner(profile: &Profile, campaign: &Campaign) -> Result<(), ApiError> {
    if campaign.organization_id == profile.id || profile.is_privileged() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the campaign's organization can do this"))
    }
}

/// Owner, admin, or an expert whose proposal on the campaign was accepted.
pub(crate) async fn ensure_participant(
    state: &AppState,
    profile: &Profile,
    campaign: &Campaign,
) -> Result<(), ApiError> {
    if ensure_owner(profile, campaign).is_ok() {
        return Ok(());
    }
    let accepted = state
        .store
        .list_proposals_for_expert(profile.id)
        .await?
        .into_iter()
        .any(|p| p.campaign_id == campaign.id && p.status == ProposalStatus::Accepted);
    if accepted {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only campaign participants can do this"))
    }
}

/// Drafts are visible to their organization and admins only.
pub(crate) fn visible_to(profile: Option<&Profile>, campaign: &Campaign) -> bool {
    campaign.status != crate::types::CampaignStatus::Draft
        || profile.is_some_and(|p| ensure_owner(p, campaign).is_ok())
}
