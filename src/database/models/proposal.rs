use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::ProposalStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Proposal {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub expert_id: Uuid,
    pub cover_letter: String,
    pub proposed_rate: Option<Decimal>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProposal {
    pub cover_letter: String,
    #[serde(default)]
    pub proposed_rate: Option<Decimal>,
}
