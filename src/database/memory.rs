use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::*;
use crate::database::store::*;
use crate::types::{CampaignStatus, ProposalStatus, Role, TaskStatus};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    expert_profiles: HashMap<Uuid, ExpertProfile>,
    organization_profiles: HashMap<Uuid, OrganizationProfile>,
    campaigns: HashMap<Uuid, Campaign>,
    proposals: HashMap<Uuid, Proposal>,
    notifications: HashMap<Uuid, Notification>,
    tasks: HashMap<Uuid, Task>,
    admin_logs: Vec<AdminLog>,
}

/// Process-local data access facade for `DATA_BACKEND=memory` and tests.
///
/// Mirrors the constraints the hosted database enforces: one proposal per
/// (campaign, expert) and foreign keys on campaign/proposal/task parents,
/// notification owners and task assignees.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_assignee(tables: &Tables, assignee_id: Option<Uuid>) -> Result<(), StoreError> {
    match assignee_id {
        Some(id) if !tables.profiles.contains_key(&id) => {
            Err(StoreError::invalid_reference(format!("assignee {}", id)))
        }
        _ => Ok(()),
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError> {
        let tables = self.tables.read().await;
        let profiles = newest_first(tables.profiles.values().cloned().collect(), |p| p.created_at);
        Ok(page.apply(profiles))
    }

    async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = tables.profiles.entry(profile.id).or_insert_with(|| Profile {
            id: profile.id,
            email: profile.email.clone(),
            full_name: None,
            role: profile.role,
            is_admin: profile.is_admin,
            created_at: now,
            updated_at: now,
        });
        if profile.full_name.is_some() {
            row.full_name = profile.full_name.clone();
        }
        row.role = profile.role;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn update_privileges(
        &self,
        id: Uuid,
        update: &PrivilegeUpdate,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("profile {}", id)))?;
        if let Some(role) = update.role {
            row.role = role;
        }
        if let Some(is_admin) = update.is_admin {
            row.is_admin = is_admin;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn get_expert_profile(&self, user_id: Uuid) -> Result<Option<ExpertProfile>, StoreError> {
        Ok(self.tables.read().await.expert_profiles.get(&user_id).cloned())
    }

    async fn upsert_expert_profile(
        &self,
        user_id: Uuid,
        input: &ExpertProfileInput,
    ) -> Result<ExpertProfile, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&user_id) {
            return Err(StoreError::not_found(format!("profile {}", user_id)));
        }
        let row = ExpertProfile {
            user_id,
            headline: input.headline.clone(),
            bio: input.bio.clone(),
            skills: input.skills.clone(),
            hourly_rate: input.hourly_rate,
            years_experience: input.years_experience,
            location: input.location.clone(),
            updated_at: Utc::now(),
        };
        tables.expert_profiles.insert(user_id, row.clone());
        Ok(row)
    }

    async fn get_organization_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<OrganizationProfile>, StoreError> {
        Ok(self.tables.read().await.organization_profiles.get(&user_id).cloned())
    }

    async fn upsert_organization_profile(
        &self,
        user_id: Uuid,
        input: &OrganizationProfileInput,
    ) -> Result<OrganizationProfile, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&user_id) {
            return Err(StoreError::not_found(format!("profile {}", user_id)));
        }
        let row = OrganizationProfile {
            user_id,
            name: input.name.clone(),
            website: input.website.clone(),
            industry: input.industry.clone(),
            description: input.description.clone(),
            size: input.size.clone(),
            updated_at: Utc::now(),
        };
        tables.organization_profiles.insert(user_id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        page: Page,
    ) -> Result<Vec<Campaign>, StoreError> {
        let tables = self.tables.read().await;
        let campaigns = tables
            .campaigns
            .values()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.organization_id.map_or(true, |o| c.organization_id == o))
            .filter(|c| filter.drafts.allows(c))
            .cloned()
            .collect();
        Ok(page.apply(newest_first(campaigns, |c| c.created_at)))
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self.tables.read().await.campaigns.get(&id).cloned())
    }

    async fn create_campaign(
        &self,
        organization_id: Uuid,
        input: &NewCampaign,
    ) -> Result<Campaign, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&organization_id) {
            return Err(StoreError::not_found(format!("profile {}", organization_id)));
        }
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            organization_id,
            title: input.title.clone(),
            description: input.description.clone(),
            budget: input.budget,
            status: input.status.unwrap_or(CampaignStatus::Draft),
            deadline: input.deadline,
            created_at: now,
            updated_at: now,
        };
        tables.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
    ) -> Result<Campaign, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("campaign {}", id)))?;
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(description) = &update.description {
            row.description = description.clone();
        }
        if update.budget.is_some() {
            row.budget = update.budget;
        }
        if update.deadline.is_some() {
            row.deadline = update.deadline;
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn close_expired_campaigns(&self, today: NaiveDate) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut closed = 0;
        for campaign in tables.campaigns.values_mut() {
            let expired = campaign.deadline.is_some_and(|d| d < today);
            if campaign.status == CampaignStatus::Open && expired {
                campaign.status = CampaignStatus::Completed;
                campaign.updated_at = now;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn list_proposals_for_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let tables = self.tables.read().await;
        let proposals = tables
            .proposals
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect();
        Ok(newest_first(proposals, |p| p.created_at))
    }

    async fn list_proposals_for_expert(
        &self,
        expert_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let tables = self.tables.read().await;
        let proposals = tables
            .proposals
            .values()
            .filter(|p| p.expert_id == expert_id)
            .cloned()
            .collect();
        Ok(newest_first(proposals, |p| p.created_at))
    }

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        Ok(self.tables.read().await.proposals.get(&id).cloned())
    }

    async fn create_proposal(
        &self,
        campaign_id: Uuid,
        expert_id: Uuid,
        input: &NewProposal,
    ) -> Result<Proposal, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.campaigns.contains_key(&campaign_id) {
            return Err(StoreError::not_found(format!("campaign {}", campaign_id)));
        }
        let duplicate = tables
            .proposals
            .values()
            .any(|p| p.campaign_id == campaign_id && p.expert_id == expert_id);
        if duplicate {
            return Err(StoreError::Conflict(
                "A proposal for this campaign already exists".to_string(),
            ));
        }
        let now = Utc::now();
        let proposal = Proposal {
            id: Uuid::new_v4(),
            campaign_id,
            expert_id,
            cover_letter: input.cover_letter.clone(),
            proposed_rate: input.proposed_rate,
            status: ProposalStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    async fn set_proposal_status(
        &self,
        id: Uuid,
        status: ProposalStatus,
    ) -> Result<Proposal, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .proposals
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("proposal {}", id)))?;
        row.status = status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        let notifications = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        Ok(Page::new(limit, 0).apply(newest_first(notifications, |n| n.created_at)))
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.read)
            .count();
        Ok(count as i64)
    }

    async fn create_notification(
        &self,
        input: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&input.user_id) {
            return Err(StoreError::invalid_reference(format!("user {}", input.user_id)));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            kind: input.kind.clone(),
            title: input.title.clone(),
            message: input.message.clone(),
            link: input.link.clone(),
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Notification, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.notifications.get_mut(&id) {
            Some(row) if row.user_id == user_id => {
                row.read = true;
                Ok(row.clone())
            }
            _ => Err(StoreError::not_found(format!("notification {}", id))),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let mut tables = self.tables.write().await;
        let mut changed = Vec::new();
        for row in tables.notifications.values_mut() {
            if row.user_id == user_id && !row.read {
                row.read = true;
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }

    async fn prune_notifications(
        &self,
        older_than: DateTime<Utc>,
        read_only: bool,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables
            .notifications
            .retain(|_, n| !(n.created_at < older_than && (n.read || !read_only)));
        Ok((before - tables.notifications.len()) as u64)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(&self, campaign_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| t.campaign_id == campaign_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn create_task(&self, campaign_id: Uuid, input: &NewTask) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.campaigns.contains_key(&campaign_id) {
            return Err(StoreError::not_found(format!("campaign {}", campaign_id)));
        }
        check_assignee(&tables, input.assignee_id)?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            campaign_id,
            assignee_id: input.assignee_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: TaskStatus::Todo,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        check_assignee(&tables, update.assignee_id)?;
        let row = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("task {}", id)))?;
        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if update.description.is_some() {
            row.description = update.description.clone();
        }
        if update.assignee_id.is_some() {
            row.assignee_id = update.assignee_id;
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        if update.due_date.is_some() {
            row.due_date = update.due_date;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn record_admin_action(&self, entry: &NewAdminLog) -> Result<AdminLog, StoreError> {
        let mut tables = self.tables.write().await;
        let log = AdminLog {
            id: Uuid::new_v4(),
            admin_id: entry.admin_id,
            action: entry.action.clone(),
            target_type: entry.target_type.clone(),
            target_id: entry.target_id,
            details: entry.details.clone(),
            created_at: Utc::now(),
        };
        tables.admin_logs.push(log.clone());
        Ok(log)
    }

    async fn list_admin_logs(&self, page: Page) -> Result<Vec<AdminLog>, StoreError> {
        let tables = self.tables.read().await;
        Ok(page.apply(tables.admin_logs.iter().rev().cloned()))
    }

    async fn platform_stats(&self) -> Result<PlatformStats, StoreError> {
        let tables = self.tables.read().await;
        let count_role =
            |role: Role| tables.profiles.values().filter(|p| p.role == role).count() as i64;
        Ok(PlatformStats {
            users: tables.profiles.len() as i64,
            experts: count_role(Role::Expert),
            organizations: count_role(Role::Organization),
            admins: tables.profiles.values().filter(|p| p.is_privileged()).count() as i64,
            open_campaigns: tables
                .campaigns
                .values()
                .filter(|c| c.status == CampaignStatus::Open)
                .count() as i64,
            total_campaigns: tables.campaigns.len() as i64,
            pending_proposals: tables
                .proposals
                .values()
                .filter(|p| p.status == ProposalStatus::Pending)
                .count() as i64,
            unread_notifications: tables.notifications.values().filter(|n| !n.read).count() as i64,
        })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
