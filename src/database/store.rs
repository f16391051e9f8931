use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::*;
use crate::types::ProposalStatus;

/// Errors from the data access facade
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A write pointed at a row that does not exist (foreign key violation).
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn invalid_reference(what: impl Into<String>) -> Self {
        StoreError::InvalidReference(what.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                let constraint = db.constraint().unwrap_or("foreign key");
                StoreError::InvalidReference(constraint.to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError>;

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError>;

    /// Insert, or refresh name/role when the auth provider already created the row.
    async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError>;

    async fn update_privileges(
        &self,
        id: Uuid,
        update: &PrivilegeUpdate,
    ) -> Result<Profile, StoreError>;

    async fn get_expert_profile(&self, user_id: Uuid) -> Result<Option<ExpertProfile>, StoreError>;

    async fn upsert_expert_profile(
        &self,
        user_id: Uuid,
        input: &ExpertProfileInput,
    ) -> Result<ExpertProfile, StoreError>;

    async fn get_organization_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<OrganizationProfile>, StoreError>;

    async fn upsert_organization_profile(
        &self,
        user_id: Uuid,
        input: &OrganizationProfileInput,
    ) -> Result<OrganizationProfile, StoreError>;
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        page: Page,
    ) -> Result<Vec<Campaign>, StoreError>;

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError>;

    async fn create_campaign(
        &self,
        organization_id: Uuid,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError>;

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
    ) -> Result<Campaign, StoreError>;

    /// Move `open` campaigns whose deadline is before `today` to `completed`.
    async fn close_expired_campaigns(&self, today: NaiveDate) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn list_proposals_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError>;

    async fn list_proposals_for_expert(&self, expert_id: Uuid) -> Result<Vec<Proposal>, StoreError>;

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError>;

    async fn create_proposal(
        &self,
        campaign_id: Uuid,
        expert_id: Uuid,
        input: &NewProposal,
    ) -> Result<Proposal, StoreError>;

    async fn set_proposal_status(
        &self,
        id: Uuid,
        status: ProposalStatus,
    ) -> Result<Proposal, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError>;

    async fn create_notification(
        &self,
        input: &NewNotification,
    ) -> Result<Notification, StoreError>;

    /// Fails with `NotFound` unless the notification belongs to `user_id`.
    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Notification, StoreError>;

    /// Returns the rows that changed from unread to read.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError>;

    async fn prune_notifications(
        &self,
        older_than: DateTime<Utc>,
        read_only: bool,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self, campaign_id: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn create_task(&self, campaign_id: Uuid, input: &NewTask) -> Result<Task, StoreError>;

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, StoreError>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn record_admin_action(&self, entry: &NewAdminLog) -> Result<AdminLog, StoreError>;

    /// Newest first.
    async fn list_admin_logs(&self, page: Page) -> Result<Vec<AdminLog>, StoreError>;

    async fn platform_stats(&self) -> Result<PlatformStats, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// The uniform typed client used by handlers, pages and the realtime channel.
pub trait DataStore:
    ProfileStore + CampaignStore + ProposalStore + NotificationStore + TaskStore + AdminStore
{
}

impl<T> DataStore for T where
    T: ProfileStore + CampaignStore + ProposalStore + NotificationStore + TaskStore + AdminStore
{
}
