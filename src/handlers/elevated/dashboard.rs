// handlers/elevated/dashboard.rs - GET /admin
//
// Anonymous callers go to the login page, signed-in non-admins to
// /unauthorized, admins get the dashboard.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};

use crate::app::AppState;
use crate::auth::{AdminDecision, AdminIdentity, Identity};
use crate::database::models::{AdminLog, Page, PlatformStats, Profile};
use crate::database::StoreError;
use crate::handlers::render::{escape_html, page};
use crate::middleware::admin_decision;

pub const LOGIN_REDIRECT: &str = "/auth/login?redirect=/admin";
pub const UNAUTHORIZED_REDIRECT: &str = "/unauthorized";

pub enum DashboardAccess {
    Anonymous,
    NotAdmin,
    Admin(AdminIdentity),
}

#[async_trait]
impl FromRequestParts<AppState> for DashboardAccess {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.extensions.get::<Identity>().is_none() {
            return Ok(DashboardAccess::Anonymous);
        }
        Ok(match admin_decision(parts, state).await {
            AdminDecision::Authorized(admin) => DashboardAccess::Admin(admin),
            AdminDecision::Denied(reason) => {
                tracing::info!(?reason, "Dashboard access denied");
                DashboardAccess::NotAdmin
            }
        })
    }
}

pub async fn admin_dashboard(State(state): State<AppState>, access: DashboardAccess) -> Response {
    let admin = match access {
        DashboardAccess::Anonymous => return Redirect::to(LOGIN_REDIRECT).into_response(),
        DashboardAccess::NotAdmin => return Redirect::to(UNAUTHORIZED_REDIRECT).into_response(),
        DashboardAccess::Admin(admin) => admin,
    };

    match load_dashboard(&state).await {
        Ok((stats, users, logs)) => {
            page("Admin dashboard", &render(&admin, &stats, &users, &logs)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load admin dashboard: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                page("Error", "<h1>Something went wrong</h1><p>Please try again later.</p>"),
            )
                .into_response()
        }
    }
}

async fn load_dashboard(
    state: &AppState,
) -> Result<(PlatformStats, Vec<Profile>, Vec<AdminLog>), StoreError> {
    let stats = state.store.platform_stats().await?;
    let users = state.store.list_profiles(Page::new(20, 0)).await?;
    let logs = state.store.list_admin_logs(Page::new(10, 0)).await?;
    Ok((stats, users, logs))
}

fn render(
    admin: &AdminIdentity,
    stats: &PlatformStats,
    users: &[Profile],
    logs: &[AdminLog],
) -> String {
    let stat = |label: &str, value: i64| {
        format!(
            r#"<div class="stat"><div>{}</div><strong>{}</strong></div>"#,
            escape_html(label),
            value
        )
    };
    let stats_html = [
        stat("Users", stats.users),
        stat("Experts", stats.experts),
        stat("Organizations", stats.organizations),
        stat("Admins", stats.admins),
        stat("Open campaigns", stats.open_campaigns),
        stat("All campaigns", stats.total_campaigns),
        stat("Pending proposals", stats.pending_proposals),
        stat("Unread notifications", stats.unread_notifications),
    ]
    .join("\n");

    let user_rows: String = users
        .iter()
        .map(|u| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&u.email),
                escape_html(u.full_name.as_deref().unwrap_or("")),
                u.role,
                if u.is_admin { "yes" } else { "no" },
                u.created_at.format("%Y-%m-%d"),
            )
        })
        .collect();

    let log_rows: String = logs
        .iter()
        .map(|l| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                l.created_at.format("%Y-%m-%d %H:%M"),
                escape_html(&l.action),
                escape_html(&l.target_type),
                l.target_id.map(|id| id.to_string()).unwrap_or_default(),
            )
        })
        .collect();

    format!(
        r#"<h1>Admin dashboard</h1>
<p>Signed in as {who}</p>
<section class="stats">
{stats_html}
</section>
<h2>Recent users</h2>
<table>
<thead><tr><th>Email</th><th>Name</th><th>Role</th><th>Admin</th><th>Joined</th></tr></thead>
<tbody>
{user_rows}
</tbody>
</table>
<h2>Admin activity</h2>
<table>
<thead><tr><th>When</th><th>Action</th><th>Target</th><th>Target id</th></tr></thead>
<tbody>
{log_rows}
</tbody>
</table>"#,
        who = escape_html(admin.email.as_deref().unwrap_or("admin")),
        stats_html = stats_html,
        user_rows = user_rows,
        log_rows = log_rows,
    )
}
