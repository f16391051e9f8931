// handlers/public/pages.rs - GET/POST /auth/login, GET /unauthorized

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::auth::cookie_headers;
use crate::app::AppState;
use crate::handlers::render::{escape_html, page};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub redirect: Option<String>,
}

/// Only same-site absolute paths are followed after sign-in.
pub fn safe_redirect(target: Option<&str>) -> &str {
    match target {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_ascii_control()) =>
        {
            path
        }
        _ => "/",
    }
}

fn login_markup(redirect: &str, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape_html(e)))
        .unwrap_or_default();
    format!(
        r#"<h1>Sign in</h1>
{error}
<form method="post" action="/auth/login">
  <input type="hidden" name="redirect" value="{redirect}">
  <p><label>Email <input type="email" name="email" required></label></p>
  <p><label>Password <input type="password" name="password" required></label></p>
  <p><button type="submit">Sign in</button></p>
</form>"#,
        error = error,
        redirect = escape_html(redirect),
    )
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Response {
    let redirect = safe_redirect(query.redirect.as_deref());
    page("Sign in", &login_markup(redirect, None)).into_response()
}

pub async fn login_form(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let redirect = safe_redirect(form.redirect.as_deref()).to_string();

    match state.auth.sign_in_with_password(form.email.trim(), &form.password).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user.id, "User signed in via login page");
            let headers: HeaderMap = cookie_headers(&session, &state.config.session);
            (headers, Redirect::to(&redirect)).into_response()
        }
        Err(e) => {
            let (status, message) = if e.is_upstream() {
                tracing::error!("Sign-in unavailable: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Sign-in is temporarily unavailable")
            } else {
                (StatusCode::UNAUTHORIZED, "Invalid email or password")
            };
            (status, page("Sign in", &login_markup(&redirect, Some(message)))).into_response()
        }
    }
}

pub async fn unauthorized_page() -> Response {
    page(
        "Unauthorized",
        r#"<h1>Unauthorized</h1>
<p>Your account does not have access to this page.</p>
<p><a href="/">Back to the home page</a></p>"#,
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_stay_on_site() {
        assert_eq!(safe_redirect(Some("/admin")), "/admin");
        assert_eq!(safe_redirect(Some("//evil.example")), "/");
        assert_eq!(safe_redirect(Some("https://evil.example")), "/");
        // Browsers drop tab/CR/LF while parsing, turning these into `//evil.example`
        assert_eq!(safe_redirect(Some("/\t/evil.example")), "/");
        assert_eq!(safe_redirect(Some("/\r\n/evil.example")), "/");
        assert_eq!(safe_redirect(Some("/campaigns?tab=open")), "/campaigns?tab=open");
        assert_eq!(safe_redirect(None), "/");
    }

    #[test]
    fn login_markup_escapes_redirect() {
        let html = login_markup(r#"/x"><script>"#, Some("bad <b>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("bad &lt;b&gt;"));
    }
}
