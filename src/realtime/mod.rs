//! Realtime notification channel.
//!
//! Row changes on `notifications` arrive as [`ChangeEvent`]s, either from the
//! database change feed ([`listener`]) or published directly by this process.
//! The [`SubscriptionRegistry`] fans them out per user, and each connected
//! client folds them into a [`NotificationFeed`].

pub mod listener;
pub mod registry;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Notification;

pub use listener::ChangeFeed;
pub use registry::{Subscription, SubscriptionRegistry};

/// A row change on `notifications`, in the change feed's wire format:
/// `{"op":"INSERT","record":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "record", rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert(Notification),
    Update(Notification),
}

impl ChangeEvent {
    pub fn record(&self) -> &Notification {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => record,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.record().user_id
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "insert",
            ChangeEvent::Update(_) => "update",
        }
    }
}

/// Client-side view of a user's notifications: newest first, plus the
/// number still unread.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationFeed {
    notifications: Vec<Notification>,
    unread: u64,
}

impl NotificationFeed {
    /// Start from a fetched list, assumed newest first.
    pub fn from_snapshot(notifications: Vec<Notification>) -> Self {
        let unread = notifications.iter().filter(|n| !n.read).count() as u64;
        Self { notifications, unread }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    pub fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::Insert(record) => self.insert(record.clone()),
            ChangeEvent::Update(record) => self.update(record.clone()),
        }
    }

    fn insert(&mut self, record: Notification) {
        // A replayed insert replaces the row instead of duplicating it.
        if self.notifications.iter().any(|n| n.id == record.id) {
            self.update(record);
            return;
        }
        if !record.read {
            self.unread += 1;
        }
        self.notifications.insert(0, record);
    }

    fn update(&mut self, record: Notification) {
        let Some(existing) = self.notifications.iter_mut().find(|n| n.id == record.id) else {
            return;
        };
        match (existing.read, record.read) {
            (false, true) => self.unread = self.unread.saturating_sub(1),
            (true, false) => self.unread += 1,
            _ => {}
        }
        *existing = record;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn notification(read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: "proposal".to_string(),
            title: "New proposal".to_string(),
            message: "An expert applied".to_string(),
            link: None,
            read,
            created_at: Utc::now(),
        }
    }

    fn read(mut n: Notification) -> Notification {
        n.read = true;
        n
    }

    #[test]
    fn insert_unread_increments_by_one() {
        let mut feed = NotificationFeed::default();
        let n = notification(false);
        feed.apply(&ChangeEvent::Insert(n.clone()));
        assert_eq!(feed.unread(), 1);
        assert_eq!(feed.notifications()[0].id, n.id);

        feed.apply(&ChangeEvent::Insert(notification(true)));
        assert_eq!(feed.unread(), 1);
        assert_eq!(feed.notifications().len(), 2);
    }

    #[test]
    fn marking_read_decrements_and_saturates() {
        let n = notification(false);
        let mut feed = NotificationFeed::from_snapshot(vec![n.clone()]);
        assert_eq!(feed.unread(), 1);

        feed.apply(&ChangeEvent::Update(read(n.clone())));
        assert_eq!(feed.unread(), 0);

        // Replayed update must not go below zero.
        feed.apply(&ChangeEvent::Update(read(n.clone())));
        assert_eq!(feed.unread(), 0);
        assert!(feed.notifications()[0].read);
    }

    #[test]
    fn marking_unread_increments() {
        let n = notification(true);
        let mut feed = NotificationFeed::from_snapshot(vec![n.clone()]);
        let mut unread = n;
        unread.read = false;
        feed.apply(&ChangeEvent::Update(unread));
        assert_eq!(feed.unread(), 1);
    }

    #[test]
    fn unknown_updates_are_ignored() {
        let mut feed = NotificationFeed::from_snapshot(vec![notification(false)]);
        feed.apply(&ChangeEvent::Update(read(notification(false))));
        assert_eq!(feed.unread(), 1);
        assert_eq!(feed.notifications().len(), 1);
    }

    #[test]
    fn duplicate_insert_replaces() {
        let n = notification(false);
        let mut feed = NotificationFeed::default();
        feed.apply(&ChangeEvent::Insert(n.clone()));
        feed.apply(&ChangeEvent::Insert(n));
        assert_eq!(feed.notifications().len(), 1);
        assert_eq!(feed.unread(), 1);
    }

    #[test]
    fn wire_format_uses_op_and_record() {
        let n = notification(false);
        let payload = json!({ "op": "UPDATE", "record": n });
        let event: ChangeEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(event, ChangeEvent::Update(n.clone()));
        assert_eq!(event.user_id(), n.user_id);
        assert_eq!(serde_json::to_value(&ChangeEvent::Insert(n)).unwrap()["op"], "INSERT");
    }
}
