use sqlx::postgres::{PgListener, PgPool};
use tokio::task::JoinHandle;

use super::{ChangeEvent, SubscriptionRegistry};

/// Forwards `NOTIFY` payloads from the notifications trigger into the registry.
pub struct ChangeFeed {
    pool: PgPool,
    channel: String,
    registry: SubscriptionRegistry,
}

impl ChangeFeed {
    pub fn new(pool: PgPool, channel: impl Into<String>, registry: SubscriptionRegistry) -> Self {
        Self {
            pool,
            channel: channel.into(),
            registry,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!(channel = %self.channel, "Notification change feed stopped: {}", e);
            }
        })
    }

    /// Listen until the connection fails for good. `PgListener` reconnects
    /// on its own; anything it gives up on ends the feed.
    pub async fn run(&self) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        tracing::info!(channel = %self.channel, "Listening for notification changes");

        loop {
            let notification = listener.recv().await?;
            match parse_payload(notification.payload()) {
                Some(event) => {
                    let delivered = self.registry.publish(event);
                    tracing::trace!(delivered, "Forwarded notification change");
                }
                None => tracing::warn!(
                    channel = %self.channel,
                    "Ignoring malformed change payload"
                ),
            }
        }
    }
}

pub fn parse_payload(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!("Change payload did not parse: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trigger_payload() {
        // Shape produced by row_to_json() in the notify trigger.
        let payload = r#"{"op":"INSERT","record":{
            "id":"0b6c3c1e-58d2-4a55-9a5e-2f1f8d5f7c10",
            "user_id":"6d0c8a4e-1f4b-4c8e-b3f3-0f54a7c1d9a2",
            "kind":"proposal_accepted","title":"Accepted","message":"Your proposal was accepted",
            "link":"/campaigns/1","read":false,"created_at":"2025-03-01T10:15:30.123456+00:00"}}"#;
        let event = parse_payload(payload).unwrap();
        assert!(matches!(event, ChangeEvent::Insert(ref n) if n.kind == "proposal_accepted"));
    }

    #[test]
    fn rejects_unknown_ops() {
        assert!(parse_payload(r#"{"op":"DELETE","record":{}}"#).is_none());
        assert!(parse_payload("not json").is_none());
    }
}
