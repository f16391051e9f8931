// handlers/public/auth/mod.rs - Session acquisition
//
// POST /api/auth/register, /api/auth/login and /api/auth/refresh. Successful
// sign-in and refresh set the session cookies and also return the tokens so
// API clients can use a bearer header instead.

pub mod login;
pub mod refresh;
pub mod register;

pub use login::login;
pub use refresh::refresh;
pub use register::register;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::auth::session::{append_cookies, session_cookies};
use crate::auth::{Identity, Session};
use crate::config::SessionConfig;
use crate::database::models::Profile;

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub user: Identity,
    pub profile: Option<Profile>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl SessionBody {
    pub fn new(session: Session, profile: Option<Profile>) -> Self {
        Self {
            user: session.user,
            profile,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
        }
    }
}

pub fn cookie_headers(session: &Session, config: &SessionConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append_cookies(&mut headers, session_cookies(session, config));
    headers
}
