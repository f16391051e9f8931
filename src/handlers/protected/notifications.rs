// handlers/protected/notifications.rs - Notification list, read state and realtime stream
//
// GET /api/notifications/stream is a Server-Sent Events feed:
//
//   event: snapshot   data: {"notifications":[...],"unread_count":N}
//   event: insert     data: <notification>
//   event: update     data: <notification>
//   event: resync     data: {"missed":N}   (client fell behind; re-fetch)
//
// The stream owns its realtime subscription, so a disconnect releases it.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Notification;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::realtime::Subscription;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

async fn load(state: &AppState, user_id: Uuid, limit: i64) -> Result<NotificationList, ApiError> {
    let notifications = state.store.list_notifications(user_id, limit).await?;
    let unread_count = state.store.unread_count(user_id).await?;
    Ok(NotificationList {
        notifications,
        unread_count,
    })
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<NotificationList> {
    let limit = query
        .limit
        .unwrap_or(state.config.realtime.snapshot_limit)
        .clamp(1, state.config.api.max_page_size);
    Ok(ApiResponse::success(load(&state, user.id(), limit).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    let notification = state.notifications.mark_read(user.id(), id).await?;
    Ok(ApiResponse::success(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<serde_json::Value> {
    let updated = state.notifications.mark_all_read(user.id()).await?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}

fn json_event(name: &str, data: &impl Serialize) -> Option<Event> {
    match serde_json::to_string(data) {
        Ok(data) => Some(Event::default().event(name).data(data)),
        Err(e) => {
            tracing::error!(event = name, "Failed to serialize event: {}", e);
            None
        }
    }
}

struct StreamState {
    subscription: Subscription,
    pending: Option<Event>,
}

pub async fn stream(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe before the snapshot so nothing written in between is lost.
    let subscription = state.realtime.subscribe(user.id());
    let snapshot = load(&state, user.id(), state.config.realtime.snapshot_limit).await?;
    tracing::info!(user_id = %user.id(), "Client subscribed to notification stream");

    let initial = StreamState {
        subscription,
        pending: json_event("snapshot", &snapshot),
    };

    let events = stream::unfold(initial, |mut st| async move {
        if let Some(event) = st.pending.take() {
            return Some((Ok(event), st));
        }
        loop {
            match st.subscription.recv().await {
                Ok(change) => {
                    if let Some(event) = json_event(change.name(), change.record()) {
                        return Some((Ok(event), st));
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        user_id = %st.subscription.user_id(),
                        missed,
                        "Notification stream lagged"
                    );
                    if let Some(event) = json_event("resync", &json!({ "missed": missed })) {
                        return Some((Ok(event), st));
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.config.realtime.heartbeat_secs))
        .text("heartbeat");

    Ok(Sse::new(events).keep_alive(keep_alive))
}
