pub mod admin_log;
pub mod campaign;
pub mod notification;
pub mod profile;
pub mod proposal;
pub mod task;

pub use admin_log::{AdminLog, NewAdminLog, PlatformStats};
pub use campaign::{Campaign, CampaignFilter, CampaignUpdate, DraftVisibility, NewCampaign};
pub use notification::{NewNotification, Notification};
pub use profile::{
    ExpertProfile, ExpertProfileInput, NewProfile, OrganizationProfile, OrganizationProfileInput,
    PrivilegeUpdate, Profile,
};
pub use proposal::{NewProposal, Proposal};
pub use task::{NewTask, Task, TaskUpdate};

use serde::Deserialize;

/// Limit/offset window for list queries, already clamped to configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit: limit.max(1), offset: offset.max(0) }
    }

    pub fn all() -> Self {
        Self { limit: i64::MAX, offset: 0 }
    }

    /// Slice helper for in-memory listings.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

/// `?limit=&offset=` query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn to_page(&self, default_limit: i64, max_limit: i64) -> Page {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        Page::new(limit, self.offset.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_clamps_to_bounds() {
        let query = PageQuery { limit: Some(10_000), offset: Some(-5) };
        assert_eq!(query.to_page(20, 100), Page { limit: 100, offset: 0 });

        let query = PageQuery::default();
        assert_eq!(query.to_page(20, 100), Page { limit: 20, offset: 0 });
    }

    #[test]
    fn page_applies_to_iterators() {
        let page = Page::new(2, 1);
        assert_eq!(page.apply(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(Page::all().apply(vec![1, 2]), vec![1, 2]);
    }
}
