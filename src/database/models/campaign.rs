use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::CampaignStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: String,
    pub budget: Option<Decimal>,
    pub status: CampaignStatus,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Campaigns start as drafts unless published immediately.
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub budget: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignFilter {
    pub status: Option<CampaignStatus>,
    pub organization_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Set by the handler from the caller, never from the query string.
    #[serde(skip)]
    pub drafts: DraftVisibility,
}

/// Which draft campaigns a listing may include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DraftVisibility {
    #[default]
    All,
    OwnedBy(Uuid),
}

impl DraftVisibility {
    /// The owner whose drafts are visible, or `None` when every draft is.
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            DraftVisibility::All => None,
            DraftVisibility::OwnedBy(id) => Some(*id),
        }
    }

    pub fn allows(&self, campaign: &Campaign) -> bool {
        match self {
            DraftVisibility::All => true,
            DraftVisibility::OwnedBy(id) => {
                campaign.status != CampaignStatus::Draft || campaign.organization_id == *id
            }
        }
    }
}
