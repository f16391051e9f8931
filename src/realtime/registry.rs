use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use uuid::Uuid;

use super::ChangeEvent;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

struct UserChannel {
    sender: broadcast::Sender<ChangeEvent>,
    subscribers: usize,
}

type Channels = HashMap<Uuid, UserChannel>;

/// Per-user broadcast channels, created on first subscribe and removed when
/// the last [`Subscription`] for the user is dropped.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    channels: Arc<Mutex<Channels>>,
    capacity: usize,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl SubscriptionRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    // Nothing panics while holding the lock.
    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        let mut channels = self.lock();
        let channel = channels.entry(user_id).or_insert_with(|| {
            let (sender, _) = broadcast::channel(self.capacity);
            UserChannel { sender, subscribers: 0 }
        });
        channel.subscribers += 1;
        let receiver = channel.sender.subscribe();

        tracing::debug!(%user_id, subscribers = channel.subscribers, "Realtime subscriber added");
        Subscription {
            user_id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Deliver an event to its owner's subscribers. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let user_id = event.user_id();
        let channels = self.lock();
        match channels.get(&user_id) {
            Some(channel) => channel.sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, user_id: Uuid) -> usize {
        self.lock().get(&user_id).map_or(0, |c| c.subscribers)
    }

    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, user_id: Uuid) {
        let mut channels = self.lock();
        if let Some(channel) = channels.get_mut(&user_id) {
            channel.subscribers = channel.subscribers.saturating_sub(1);
            if channel.subscribers == 0 {
                channels.remove(&user_id);
                tracing::debug!(%user_id, "Realtime channel removed");
            }
        }
    }
}

/// An owned realtime subscription. Dropping it releases the slot.
pub struct Subscription {
    user_id: Uuid,
    receiver: broadcast::Receiver<ChangeEvent>,
    registry: SubscriptionRegistry,
}

impl Subscription {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn recv(&mut self) -> Result<ChangeEvent, RecvError> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<ChangeEvent, TryRecvError> {
        self.receiver.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Notification;
    use chrono::Utc;

    fn insert_for(user_id: Uuid) -> ChangeEvent {
        ChangeEvent::Insert(Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: "system".to_string(),
            title: "Hello".to_string(),
            message: "World".to_string(),
            link: None,
            read: false,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn events_reach_only_their_owner() {
        let registry = SubscriptionRegistry::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut alice_sub = registry.subscribe(alice);
        let _bob_sub = registry.subscribe(bob);

        let event = insert_for(alice);
        assert_eq!(registry.publish(event.clone()), 1);
        assert_eq!(alice_sub.recv().await.unwrap(), event);
    }

    #[test]
    fn dropping_last_subscription_removes_channel() {
        let registry = SubscriptionRegistry::default();
        let user = Uuid::new_v4();

        let first = registry.subscribe(user);
        let second = registry.subscribe(user);
        assert_eq!(registry.subscriber_count(user), 2);

        drop(first);
        assert_eq!(registry.subscriber_count(user), 1);
        assert_eq!(registry.channel_count(), 1);

        drop(second);
        assert_eq!(registry.channel_count(), 0);
        assert_eq!(registry.publish(insert_for(user)), 0);
    }

    #[tokio::test]
    async fn slow_subscribers_observe_lag() {
        let registry = SubscriptionRegistry::with_capacity(1);
        let user = Uuid::new_v4();
        let mut sub = registry.subscribe(user);

        registry.publish(insert_for(user));
        registry.publish(insert_for(user));
        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(1))));
    }
}
