use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::guard::{annotate, resolve_privilege, strip_trusted_headers};
use crate::auth::session::{append_cookies, cleared_cookies, session_cookies};
use crate::auth::{Identity, Session, SessionCredentials};

/// The access token the gateway validated for this request. After a
/// refresh this is the new token, not the one in the request cookie.
#[derive(Clone, Debug)]
pub struct AccessToken(pub String);

enum SessionOutcome {
    Valid(Identity, String),
    Refreshed(Session),
    Rejected { clear_cookies: bool },
}

/// Session/identity gateway. Runs in front of every route:
///
/// 1. strips inbound `x-identity-*` headers,
/// 2. validates the access token, refreshing from the refresh cookie when it
///    is no longer accepted,
/// 3. exposes the [`Identity`] and [`AccessToken`] as request extensions,
/// 4. for perimeter paths, resolves the admin flag once and forwards it as
///    trusted headers.
pub async fn identity_gateway(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let forged = strip_trusted_headers(request.headers_mut());
    if forged > 0 {
        tracing::warn!(path = %request.uri().path(), forged, "Stripped inbound identity headers");
    }

    let credentials = SessionCredentials::from_headers(request.headers(), &state.config.session);
    let outcome = validate_session(&state, credentials).await;

    let mut set_cookies = None;
    let mut clear = false;
    let identity = match outcome {
        Some(SessionOutcome::Valid(identity, token)) => Some((identity, token)),
        Some(SessionOutcome::Refreshed(session)) => {
            let found = (session.user.clone(), session.access_token.clone());
            set_cookies = Some(session);
            Some(found)
        }
        Some(SessionOutcome::Rejected { clear_cookies }) => {
            clear = clear_cookies;
            None
        }
        None => None,
    };

    if let Some((identity, token)) = identity {
        if state.config.server.perimeter_covers(request.uri().path()) {
            let privileged = resolve_privilege(state.store.as_ref(), identity.id).await;
            annotate(request.headers_mut(), &identity, privileged);
        }
        request.extensions_mut().insert(AccessToken(token));
        request.extensions_mut().insert(identity);
    }

    let mut response = next.run(request).await;

    if let Some(session) = set_cookies {
        append_cookies(response.headers_mut(), session_cookies(&session, &state.config.session));
    } else if clear {
        append_cookies(response.headers_mut(), cleared_cookies(&state.config.session));
    }
    response
}

async fn validate_session(
    state: &AppState,
    credentials: SessionCredentials,
) -> Option<SessionOutcome> {
    if credentials.is_empty() {
        return None;
    }

    if let Some(token) = credentials.access_token {
        match state.auth.get_user(&token).await {
            Ok(identity) => return Some(SessionOutcome::Valid(identity, token)),
            Err(e) if e.is_upstream() => {
                // A provider outage is not a reason to drop the user's cookies.
                tracing::error!("Session validation failed: {}", e);
                return Some(SessionOutcome::Rejected { clear_cookies: false });
            }
            Err(e) => tracing::debug!("Access token rejected: {}", e),
        }
    }

    let Some(refresh_token) = credentials.refresh_token else {
        return Some(SessionOutcome::Rejected { clear_cookies: false });
    };
    match state.auth.refresh_session(&refresh_token).await {
        Ok(session) => {
            tracing::debug!(user_id = %session.user.id, "Session refreshed");
            Some(SessionOutcome::Refreshed(session))
        }
        Err(e) if e.is_upstream() => {
            tracing::error!("Session refresh failed: {}", e);
            Some(SessionOutcome::Rejected { clear_cookies: false })
        }
        Err(e) => {
            tracing::debug!("Refresh token rejected: {}", e);
            Some(SessionOutcome::Rejected { clear_cookies: true })
        }
    }
}
