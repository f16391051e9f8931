use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{NewNotification, Notification};
use crate::database::{DataStore, StoreError};
use crate::realtime::{ChangeEvent, SubscriptionRegistry};

/// Writes notifications and, when the database is not the change source,
/// publishes the matching realtime events itself.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DataStore>,
    registry: SubscriptionRegistry,
    publish_directly: bool,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn DataStore>,
        registry: SubscriptionRegistry,
        publish_directly: bool,
    ) -> Self {
        Self {
            store,
            registry,
            publish_directly,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    fn publish(&self, event: ChangeEvent) {
        if self.publish_directly {
            self.registry.publish(event);
        }
    }

    pub async fn notify(&self, input: NewNotification) -> Result<Notification, StoreError> {
        let notification = self.store.create_notification(&input).await?;
        tracing::debug!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Notification created"
        );
        self.publish(ChangeEvent::Insert(notification.clone()));
        Ok(notification)
    }

    /// Side-channel notification: a failure is logged, not returned.
    pub async fn notify_quietly(&self, input: NewNotification) {
        let user_id = input.user_id;
        if let Err(e) = self.notify(input).await {
            tracing::warn!(%user_id, "Failed to create notification: {}", e);
        }
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, StoreError> {
        let notification = self.store.mark_notification_read(user_id, id).await?;
        self.publish(ChangeEvent::Update(notification.clone()));
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let changed = self.store.mark_all_read(user_id).await?;
        let count = changed.len();
        for notification in changed {
            self.publish(ChangeEvent::Update(notification));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewProfile;
    use crate::database::{MemoryStore, ProfileStore};
    use crate::realtime::NotificationFeed;
    use crate::types::Role;

    async fn store_with_user() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store
            .create_profile(&NewProfile {
                id: user,
                email: "member@example.com".to_string(),
                full_name: None,
                role: Role::Expert,
                is_admin: false,
            })
            .await
            .unwrap();
        (store, user)
    }

    fn new_notification(user_id: Uuid) -> NewNotification {
        NewNotification {
            user_id,
            kind: "system".to_string(),
            title: "Welcome".to_string(),
            message: "Thanks for joining".to_string(),
            link: None,
        }
    }

    #[tokio::test]
    async fn writes_flow_to_subscribers() {
        let registry = SubscriptionRegistry::default();
        let (store, user) = store_with_user().await;
        let service = NotificationService::new(store, registry.clone(), true);
        let mut sub = registry.subscribe(user);
        let mut feed = NotificationFeed::default();

        let created = service.notify(new_notification(user)).await.unwrap();
        feed.apply(&sub.recv().await.unwrap());
        assert_eq!(feed.unread(), 1);

        service.mark_read(user, created.id).await.unwrap();
        feed.apply(&sub.recv().await.unwrap());
        assert_eq!(feed.unread(), 0);
    }

    #[tokio::test]
    async fn database_sourced_deployments_do_not_double_publish() {
        let registry = SubscriptionRegistry::default();
        let (store, user) = store_with_user().await;
        let service = NotificationService::new(store, registry.clone(), false);
        let mut sub = registry.subscribe(user);

        service.notify(new_notification(user)).await.unwrap();
        assert!(matches!(
            sub.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn mark_all_read_publishes_each_change() {
        let registry = SubscriptionRegistry::default();
        let (store, user) = store_with_user().await;
        let service = NotificationService::new(store, registry.clone(), true);
        service.notify(new_notification(user)).await.unwrap();
        service.notify(new_notification(user)).await.unwrap();

        let mut sub = registry.subscribe(user);
        assert_eq!(service.mark_all_read(user).await.unwrap(), 2);
        assert!(matches!(sub.recv().await.unwrap(), ChangeEvent::Update(n) if n.read));
        assert!(matches!(sub.recv().await.unwrap(), ChangeEvent::Update(n) if n.read));
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected_without_publishing() {
        let registry = SubscriptionRegistry::default();
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(store, registry.clone(), true);
        let stranger = Uuid::new_v4();
        let mut sub = registry.subscribe(stranger);

        let err = service.notify(new_notification(stranger)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
        assert!(sub.try_recv().is_err());
    }
}
