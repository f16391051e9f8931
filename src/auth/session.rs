use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};

use super::provider::Session;
use crate::config::SessionConfig;

/// Raw credentials presented by the browser or an API client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCredentials {
    /// A bearer header takes precedence over the access cookie.
    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig) -> Self {
        let mut credentials = Self::default();

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for cookie in Cookie::split_parse(raw).flatten() {
                let value = cookie.value().trim();
                if value.is_empty() {
                    continue;
                }
                if cookie.name() == config.access_cookie {
                    credentials.access_token = Some(value.to_string());
                } else if cookie.name() == config.refresh_cookie {
                    credentials.refresh_token = Some(value.to_string());
                }
            }
        }

        if let Some(token) = bearer_token(headers) {
            credentials.access_token = Some(token);
        }

        credentials
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn base_cookie(
    name: String,
    value: String,
    max_age: CookieDuration,
    config: &SessionConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Cookies that carry a freshly issued session.
pub fn session_cookies(session: &Session, config: &SessionConfig) -> Vec<Cookie<'static>> {
    vec![
        base_cookie(
            config.access_cookie.clone(),
            session.access_token.clone(),
            CookieDuration::seconds(session.expires_in.max(0)),
            config,
        ),
        base_cookie(
            config.refresh_cookie.clone(),
            session.refresh_token.clone(),
            CookieDuration::seconds(config.refresh_max_age_secs),
            config,
        ),
    ]
}

/// Expired cookies that remove the session from the browser.
pub fn cleared_cookies(config: &SessionConfig) -> Vec<Cookie<'static>> {
    [&config.access_cookie, &config.refresh_cookie]
        .into_iter()
        .map(|name| base_cookie(name.clone(), String::new(), CookieDuration::ZERO, config))
        .collect()
}

pub fn append_cookies(headers: &mut HeaderMap, cookies: Vec<Cookie<'static>>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Failed to encode Set-Cookie header: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::config::AppConfig;
    use uuid::Uuid;

    fn config() -> SessionConfig {
        AppConfig::development().session
    }

    #[test]
    fn reads_both_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=abc; sb-refresh-token=def"),
        );
        let creds = SessionCredentials::from_headers(&headers, &config());
        assert_eq!(creds.access_token.as_deref(), Some("abc"));
        assert_eq!(creds.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token=cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        let creds = SessionCredentials::from_headers(&headers, &config());
        assert_eq!(creds.access_token.as_deref(), Some("header"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(SessionCredentials::from_headers(&headers, &config()).is_empty());
    }

    #[test]
    fn session_cookies_are_http_only() {
        let session = Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 3600,
            user: Identity { id: Uuid::new_v4(), email: None },
        };
        let mut headers = HeaderMap::new();
        append_cookies(&mut headers, session_cookies(&session, &config()));

        let values: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 2);
        assert!(values[0].starts_with("sb-access-token=access"));
        assert!(values[0].contains("HttpOnly"));
        assert!(values[0].contains("Max-Age=3600"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let cleared = cleared_cookies(&config());
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|c| c.value().is_empty()));
        assert!(cleared[0].to_string().contains("Max-Age=0"));
    }
}
