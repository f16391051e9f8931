// handlers/public/mod.rs - Public handlers (no session required)
//
// Service info, health probe, session acquisition and the static pages.

pub mod auth;
pub mod pages;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Expert Match API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Matching platform connecting experts and organizations",
            "endpoints": {
                "auth": "/api/auth/{register,login,refresh,logout,me}",
                "profile": "/api/profile/{expert,organization}, /api/experts/:id",
                "campaigns": "/api/campaigns[/:id[/proposals|/tasks]]",
                "proposals": "/api/proposals[/:id/status]",
                "notifications": "/api/notifications[/stream|/read-all|/:id/read]",
                "admin": "/api/admin/{stats,users,logs} (admin only)",
                "pages": "/admin, /auth/login, /unauthorized"
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "realtime_channels": state.realtime.channel_count()
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
