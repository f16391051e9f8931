use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::*;
use crate::database::store::*;
use crate::types::{CampaignStatus, ProposalStatus};

const PROFILE_COLUMNS: &str = "id, email, full_name, role, is_admin, created_at, updated_at";
const CAMPAIGN_COLUMNS: &str =
    "id, organization_id, title, description, budget, status, deadline, created_at, updated_at";
const PROPOSAL_COLUMNS: &str =
    "id, campaign_id, expert_id, cover_letter, proposed_rate, status, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, link, read, created_at";
const TASK_COLUMNS: &str =
    "id, campaign_id, assignee_id, title, description, status, due_date, created_at, updated_at";
const ADMIN_LOG_COLUMNS: &str = "id, admin_id, action, target_type, target_id, details, created_at";

/// Data access facade backed by the hosted PostgreSQL database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn or_not_found<T>(row: Option<T>, what: &str, id: Uuid) -> Result<T, StoreError> {
    row.ok_or_else(|| StoreError::not_found(format!("{} {}", what, id)))
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        Ok(sqlx::query_as::<_, Profile>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, Profile>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        Ok(sqlx::query_as::<_, Profile>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
        let sql = format!(
            "INSERT INTO profiles (id, email, full_name, role, is_admin) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                full_name = COALESCE(EXCLUDED.full_name, profiles.full_name), \
                role = EXCLUDED.role, \
                updated_at = now() \
             RETURNING {PROFILE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.id)
            .bind(&profile.email)
            .bind(&profile.full_name)
            .bind(profile.role)
            .bind(profile.is_admin)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_privileges(
        &self,
        id: Uuid,
        update: &PrivilegeUpdate,
    ) -> Result<Profile, StoreError> {
        let sql = format!(
            "UPDATE profiles SET \
                role = COALESCE($2, role), \
                is_admin = COALESCE($3, is_admin), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(update.role)
            .bind(update.is_admin)
            .fetch_optional(&self.pool)
            .await?;
        or_not_found(row, "profile", id)
    }

    async fn get_expert_profile(&self, user_id: Uuid) -> Result<Option<ExpertProfile>, StoreError> {
        Ok(sqlx::query_as::<_, ExpertProfile>(
            "SELECT user_id, headline, bio, skills, hourly_rate, years_experience, location, \
             updated_at FROM expert_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_expert_profile(
        &self,
        user_id: Uuid,
        input: &ExpertProfileInput,
    ) -> Result<ExpertProfile, StoreError> {
        Ok(sqlx::query_as::<_, ExpertProfile>(
            "INSERT INTO expert_profiles \
             (user_id, headline, bio, skills, hourly_rate, years_experience, location) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
                headline = EXCLUDED.headline, bio = EXCLUDED.bio, skills = EXCLUDED.skills, \
                hourly_rate = EXCLUDED.hourly_rate, years_experience = EXCLUDED.years_experience, \
                location = EXCLUDED.location, updated_at = now() \
             RETURNING user_id, headline, bio, skills, hourly_rate, years_experience, location, \
             updated_at",
        )
        .bind(user_id)
        .bind(&input.headline)
        .bind(&input.bio)
        .bind(&input.skills)
        .bind(input.hourly_rate)
        .bind(input.years_experience)
        .bind(&input.location)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_organization_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<OrganizationProfile>, StoreError> {
        Ok(sqlx::query_as::<_, OrganizationProfile>(
            "SELECT user_id, name, website, industry, description, size, updated_at \
             FROM organization_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_organization_profile(
        &self,
        user_id: Uuid,
        input: &OrganizationProfileInput,
    ) -> Result<OrganizationProfile, StoreError> {
        Ok(sqlx::query_as::<_, OrganizationProfile>(
            "INSERT INTO organization_profiles \
             (user_id, name, website, industry, description, size) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET \
                name = EXCLUDED.name, website = EXCLUDED.website, industry = EXCLUDED.industry, \
                description = EXCLUDED.description, size = EXCLUDED.size, updated_at = now() \
             RETURNING user_id, name, website, industry, description, size, updated_at",
        )
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.website)
        .bind(&input.industry)
        .bind(&input.description)
        .bind(&input.size)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        page: Page,
    ) -> Result<Vec<Campaign>, StoreError> {
        let sql = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR organization_id = $2) \
               AND ($5::uuid IS NULL OR status <> 'draft' OR organization_id = $5) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        Ok(sqlx::query_as::<_, Campaign>(&sql)
            .bind(filter.status)
            .bind(filter.organization_id)
            .bind(page.limit)
            .bind(page.offset)
            .bind(filter.drafts.owner())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");
        Ok(sqlx::query_as::<_, Campaign>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_campaign(
        &self,
        organization_id: Uuid,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError> {
        let sql = format!(
            "INSERT INTO campaigns \
             (id, organization_id, title, description, budget, status, deadline) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CAMPAIGN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Campaign>(&sql)
            .bind(Uuid::new_v4())
            .bind(organization_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.budget)
            .bind(input.status.unwrap_or(CampaignStatus::Draft))
            .bind(input.deadline)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
    ) -> Result<Campaign, StoreError> {
        let sql = format!(
            "UPDATE campaigns SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                budget = COALESCE($4, budget), \
                deadline = COALESCE($5, deadline), \
                status = COALESCE($6, status), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {CAMPAIGN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.budget)
            .bind(update.deadline)
            .bind(update.status)
            .fetch_optional(&self.pool)
            .await?;
        or_not_found(row, "campaign", id)
    }

    async fn close_expired_campaigns(&self, today: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE campaigns SET status = $1, updated_at = now() \
             WHERE status = $2 AND deadline IS NOT NULL AND deadline < $3",
        )
        .bind(CampaignStatus::Completed)
        .bind(CampaignStatus::Open)
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProposalStore for PgStore {
    async fn list_proposals_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let sql = format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE campaign_id = $1 \
             ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Proposal>(&sql).bind(campaign_id).fetch_all(&self.pool).await?)
    }

    async fn list_proposals_for_expert(
        &self,
        expert_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let sql = format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE expert_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Proposal>(&sql).bind(expert_id).fetch_all(&self.pool).await?)
    }

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = $1");
        Ok(sqlx::query_as::<_, Proposal>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_proposal(
        &self,
        campaign_id: Uuid,
        expert_id: Uuid,
        input: &NewProposal,
    ) -> Result<Proposal, StoreError> {
        let sql = format!(
            "INSERT INTO proposals \
             (id, campaign_id, expert_id, cover_letter, proposed_rate, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PROPOSAL_COLUMNS}"
        );
        let result = sqlx::query_as::<_, Proposal>(&sql)
            .bind(Uuid::new_v4())
            .bind(campaign_id)
            .bind(expert_id)
            .bind(&input.cover_letter)
            .bind(input.proposed_rate)
            .bind(ProposalStatus::Pending)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(proposal) => Ok(proposal),
            // One proposal per (campaign, expert) is enforced by a unique index.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Conflict(
                "A proposal for this campaign already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_proposal_status(
        &self,
        id: Uuid,
        status: ProposalStatus,
    ) -> Result<Proposal, StoreError> {
        let sql = format!(
            "UPDATE proposals SET status = $2, updated_at = now() WHERE id = $1 \
             RETURNING {PROPOSAL_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Proposal>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        or_not_found(row, "proposal", id)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        );
        Ok(sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn create_notification(
        &self,
        input: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let sql = format!(
            "INSERT INTO notifications (id, user_id, kind, title, message, link, read) \
             VALUES ($1, $2, $3, $4, $5, $6, false) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Notification>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.user_id)
            .bind(&input.kind)
            .bind(&input.title)
            .bind(&input.message)
            .bind(&input.link)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Notification, StoreError> {
        let sql = format!(
            "UPDATE notifications SET read = true \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        or_not_found(row, "notification", id)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "UPDATE notifications SET read = true \
             WHERE user_id = $1 AND NOT read \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn prune_notifications(
        &self,
        older_than: DateTime<Utc>,
        read_only: bool,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE created_at < $1 AND (read OR NOT $2)")
                .bind(older_than)
                .bind(read_only)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_tasks(&self, campaign_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE campaign_id = $1 ORDER BY created_at ASC"
        );
        Ok(sqlx::query_as::<_, Task>(&sql).bind(campaign_id).fetch_all(&self.pool).await?)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        Ok(sqlx::query_as::<_, Task>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_task(&self, campaign_id: Uuid, input: &NewTask) -> Result<Task, StoreError> {
        let sql = format!(
            "INSERT INTO tasks \
             (id, campaign_id, assignee_id, title, description, status, due_date) \
             VALUES ($1, $2, $3, $4, $5, 'todo', $6) \
             RETURNING {TASK_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(Uuid::new_v4())
            .bind(campaign_id)
            .bind(input.assignee_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.due_date)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, StoreError> {
        let sql = format!(
            "UPDATE tasks SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                assignee_id = COALESCE($4, assignee_id), \
                status = COALESCE($5, status), \
                due_date = COALESCE($6, due_date), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.assignee_id)
            .bind(update.status)
            .bind(update.due_date)
            .fetch_optional(&self.pool)
            .await?;
        or_not_found(row, "task", id)
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn record_admin_action(&self, entry: &NewAdminLog) -> Result<AdminLog, StoreError> {
        let sql = format!(
            "INSERT INTO admin_logs (id, admin_id, action, target_type, target_id, details) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ADMIN_LOG_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AdminLog>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.admin_id)
            .bind(&entry.action)
            .bind(&entry.target_type)
            .bind(entry.target_id)
            .bind(&entry.details)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_admin_logs(&self, page: Page) -> Result<Vec<AdminLog>, StoreError> {
        let sql = format!(
            "SELECT {ADMIN_LOG_COLUMNS} FROM admin_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        Ok(sqlx::query_as::<_, AdminLog>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn platform_stats(&self) -> Result<PlatformStats, StoreError> {
        Ok(sqlx::query_as::<_, PlatformStats>(
            "SELECT \
                (SELECT COUNT(*) FROM profiles) AS users, \
                (SELECT COUNT(*) FROM profiles WHERE role = 'expert') AS experts, \
                (SELECT COUNT(*) FROM profiles WHERE role = 'organization') AS organizations, \
                (SELECT COUNT(*) FROM profiles WHERE is_admin OR role = 'admin') AS admins, \
                (SELECT COUNT(*) FROM campaigns WHERE status = 'open') AS open_campaigns, \
                (SELECT COUNT(*) FROM campaigns) AS total_campaigns, \
                (SELECT COUNT(*) FROM proposals WHERE status = 'pending') AS pending_proposals, \
                (SELECT COUNT(*) FROM notifications WHERE NOT read) AS unread_notifications",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
