use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::{AuthProvider, HostedAuth, LocalAuth};
use crate::config::{AppConfig, AuthBackend, DataBackend, RealtimeSource, SecurityConfig};
use crate::database::{DataStore, DatabaseManager, MemoryStore, PgStore};
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::identity_gateway;
use crate::realtime::SubscriptionRegistry;
use crate::services::{Mailer, NotificationService};

/// Shared handles every handler and the gateway see.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub realtime: SubscriptionRegistry,
    pub notifications: NotificationService,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DataStore>, auth: Arc<dyn AuthProvider>) -> Self {
        let realtime = SubscriptionRegistry::with_capacity(config.realtime.channel_capacity);
        let notifications = NotificationService::new(
            store.clone(),
            realtime.clone(),
            config.realtime.source == RealtimeSource::InProcess,
        );
        let mailer = Mailer::new(config.integrations.email.clone());

        Self {
            config: Arc::new(config),
            store,
            auth,
            realtime,
            notifications,
            mailer,
        }
    }

    /// Build the backends the configuration selects. The pool is returned
    /// so the caller can start the database change feed.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<(Self, Option<PgPool>)> {
        let (store, pool): (Arc<dyn DataStore>, Option<PgPool>) = match config.server.data_backend {
            DataBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database).await?;
                (Arc::new(PgStore::new(pool.clone())), Some(pool))
            }
            DataBackend::Memory => {
                tracing::warn!("Using the in-memory data backend; nothing will be persisted");
                (Arc::new(MemoryStore::new()), None)
            }
        };

        let auth: Arc<dyn AuthProvider> = match config.server.auth_backend {
            AuthBackend::Hosted => Arc::new(HostedAuth::from_config(&config.backend)?),
            AuthBackend::Local => {
                tracing::warn!(
                    "Using local development accounts instead of the hosted auth provider"
                );
                Arc::new(LocalAuth::from_config(&config)?)
            }
        };

        Ok((Self::new(config, store, auth), pool))
    }
}

pub fn router(state: AppState) -> Router {
    let trace_level = if state.config.api.enable_request_logging {
        Level::INFO
    } else {
        Level::DEBUG
    };

    Router::new()
        .merge(public_routes())
        .merge(page_routes())
        .merge(auth_routes())
        .merge(profile_routes())
        .merge(campaign_routes())
        .merge(notification_routes())
        .merge(admin_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), identity_gateway))
        .layer(cors_layer(&state.config.security))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(trace_level))
                .on_response(DefaultOnResponse::new().level(trace_level)),
        )
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/auth/register", post(public::auth::register))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/refresh", post(public::auth::refresh))
}

fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(public::pages::login_page).post(public::pages::login_form))
        .route("/unauthorized", get(public::pages::unauthorized_page))
        .route("/admin", get(elevated::dashboard::admin_dashboard))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
}

fn profile_routes() -> Router<AppState> {
    use protected::profile;

    Router::new()
        .route(
            "/api/profile/expert",
            get(profile::get_expert_profile).put(profile::put_expert_profile),
        )
        .route(
            "/api/profile/organization",
            get(profile::get_organization_profile).put(profile::put_organization_profile),
        )
        .route("/api/experts/:id", get(profile::show_expert))
}

fn campaign_routes() -> Router<AppState> {
    use protected::{campaigns, proposals, tasks};

    Router::new()
        .route("/api/campaigns", get(campaigns::list).post(campaigns::create))
        .route("/api/campaigns/:id", get(campaigns::show).patch(campaigns::update))
        .route(
            "/api/campaigns/:id/proposals",
            get(proposals::list_for_campaign).post(proposals::submit),
        )
        .route("/api/proposals", get(proposals::list_own))
        .route("/api/proposals/:id/status", patch(proposals::set_status))
        .route("/api/campaigns/:id/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/:id", patch(tasks::update))
}

fn notification_routes() -> Router<AppState> {
    use protected::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/stream", get(notifications::stream))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
}

fn admin_routes() -> Router<AppState> {
    use elevated::admin;

    Router::new()
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id", patch(admin::update_user))
        .route("/api/admin/logs", get(admin::list_logs))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.permissive_cors {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut config = AppConfig::development();
        config.server.data_backend = DataBackend::Memory;
        config.server.auth_backend = AuthBackend::Local;
        config.backend.jwt_secret = Some("router-test-secret".to_string());
        config.realtime.source = RealtimeSource::InProcess;
        let auth = LocalAuth::from_config(&config).unwrap();
        AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(auth))
    }

    #[tokio::test]
    async fn unknown_routes_use_error_envelope() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_api_requires_a_session() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/api/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_page_redirects_anonymous_callers() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?redirect=/admin"
        );
    }
}
