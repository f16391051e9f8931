use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub realtime: RealtimeConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Where the data access facade keeps its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBackend {
    Postgres,
    Memory,
}

/// Which identity provider validates sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthBackend {
    /// The hosted auth REST API at `BACKEND_URL`.
    Hosted,
    /// In-process accounts signed with `BACKEND_JWT_SECRET`. Development only.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub data_backend: DataBackend,
    pub auth_backend: AuthBackend,
    /// Path prefixes for which the identity gateway resolves the admin flag
    /// and forwards it to handlers as trusted headers.
    pub perimeter_admin_prefixes: Vec<String>,
}

impl ServerConfig {
    pub fn perimeter_covers(&self, path: &str) -> bool {
        self.perimeter_admin_prefixes.iter().any(|prefix| {
            // "/admin/" and "/admin" are the same boundary; "/" covers everything.
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub secure_cookies: bool,
    pub refresh_max_age_secs: i64,
    pub local_token_ttl_secs: i64,
}

/// Where notification change events originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeSource {
    /// `LISTEN` on the database's notification change channel.
    Database,
    /// Writes made by this process publish directly.
    InProcess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub source: RealtimeSource,
    pub listen_channel: String,
    pub channel_capacity: usize,
    pub heartbeat_secs: u64,
    pub snapshot_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub permissive_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    pub sentry_dsn: Option<String>,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("EXPERT_MATCH_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATA_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.server.data_backend = DataBackend::Memory,
                "postgres" | "postgresql" => self.server.data_backend = DataBackend::Postgres,
                other => tracing::warn!("Ignoring unknown DATA_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("AUTH_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "local" => self.server.auth_backend = AuthBackend::Local,
                "hosted" => self.server.auth_backend = AuthBackend::Hosted,
                other => tracing::warn!("Ignoring unknown AUTH_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("PERIMETER_ADMIN_PREFIXES") {
            self.server.perimeter_admin_prefixes = split_list(&v);
        }

        // Backend service
        self.backend.url = env::var("BACKEND_URL").ok().or(self.backend.url);
        self.backend.anon_key = env::var("BACKEND_ANON_KEY").ok().or(self.backend.anon_key);
        self.backend.service_role_key =
            env::var("BACKEND_SERVICE_ROLE_KEY").ok().or(self.backend.service_role_key);
        self.backend.jwt_secret = env::var("BACKEND_JWT_SECRET").ok().or(self.backend.jwt_secret);
        if let Ok(v) = env::var("BACKEND_REQUEST_TIMEOUT_SECS") {
            self.backend.request_timeout_secs =
                v.parse().unwrap_or(self.backend.request_timeout_secs);
        }

        // Database overrides
        self.database.url = env::var("DATABASE_URL").ok().or(self.database.url);
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_SECURE_COOKIES") {
            self.session.secure_cookies = v.parse().unwrap_or(self.session.secure_cookies);
        }
        if let Ok(v) = env::var("SESSION_REFRESH_MAX_AGE_SECS") {
            self.session.refresh_max_age_secs =
                v.parse().unwrap_or(self.session.refresh_max_age_secs);
        }

        // Realtime overrides
        if let Ok(v) = env::var("REALTIME_SOURCE") {
            match v.to_ascii_lowercase().as_str() {
                "database" => self.realtime.source = RealtimeSource::Database,
                "in_process" | "inprocess" => self.realtime.source = RealtimeSource::InProcess,
                other => tracing::warn!("Ignoring unknown REALTIME_SOURCE '{}'", other),
            }
        } else if self.server.data_backend == DataBackend::Memory {
            self.realtime.source = RealtimeSource::InProcess;
        }
        if let Ok(v) = env::var("REALTIME_LISTEN_CHANNEL") {
            self.realtime.listen_channel = v;
        }
        if let Ok(v) = env::var("REALTIME_CHANNEL_CAPACITY") {
            self.realtime.channel_capacity = v.parse().unwrap_or(self.realtime.channel_capacity);
        }
        if let Ok(v) = env::var("REALTIME_HEARTBEAT_SECS") {
            self.realtime.heartbeat_secs = v.parse().unwrap_or(self.realtime.heartbeat_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
            self.security.permissive_cors = false;
        }

        // Optional integrations
        self.integrations.sentry_dsn = env::var("SENTRY_DSN").ok().or(self.integrations.sentry_dsn);
        if let (Ok(api_url), Ok(api_key)) = (env::var("EMAIL_API_URL"), env::var("EMAIL_API_KEY")) {
            self.integrations.email = Some(EmailConfig {
                api_url,
                api_key,
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@expert-match.local".to_string()),
            });
        }

        self
    }

    /// Check that every variable the selected backends need is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.data_backend == DataBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        match self.server.auth_backend {
            AuthBackend::Hosted => {
                if self.backend.url.is_none() {
                    return Err(ConfigError::Missing("BACKEND_URL"));
                }
                if self.backend.anon_key.is_none() {
                    return Err(ConfigError::Missing("BACKEND_ANON_KEY"));
                }
            }
            AuthBackend::Local => {
                if self.environment == Environment::Production {
                    return Err(ConfigError::Invalid(
                        "AUTH_BACKEND=local cannot be used in production".to_string(),
                    ));
                }
                if self.backend.jwt_secret.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Missing("BACKEND_JWT_SECRET"));
                }
            }
        }

        if self.realtime.source == RealtimeSource::Database
            && self.server.data_backend == DataBackend::Memory
        {
            return Err(ConfigError::Invalid(
                "REALTIME_SOURCE=database requires DATA_BACKEND=postgres".to_string(),
            ));
        }

        if self.api.max_page_size < 1 || self.api.default_page_size > self.api.max_page_size {
            return Err(ConfigError::Invalid(
                "API page sizes must satisfy 1 <= default <= max".to_string(),
            ));
        }

        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                data_backend: DataBackend::Postgres,
                auth_backend: AuthBackend::Hosted,
                perimeter_admin_prefixes: vec!["/admin".to_string()],
            },
            backend: BackendConfig {
                url: None,
                anon_key: None,
                service_role_key: None,
                jwt_secret: None,
                request_timeout_secs: 10,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            session: SessionConfig {
                access_cookie: "sb-access-token".to_string(),
                refresh_cookie: "sb-refresh-token".to_string(),
                secure_cookies: false,
                refresh_max_age_secs: 60 * 60 * 24 * 30,
                local_token_ttl_secs: 60 * 60,
            },
            realtime: RealtimeConfig {
                source: RealtimeSource::Database,
                listen_channel: "notification_changes".to_string(),
                channel_capacity: 64,
                heartbeat_secs: 15,
                snapshot_limit: 50,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 200,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                permissive_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            integrations: IntegrationsConfig {
                sentry_dsn: None,
                email: None,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.session.secure_cookies = true;
        config.api.max_page_size = 100;
        config.security.permissive_cors = false;
        config.security.cors_origins = vec!["https://staging.expert-match.app".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.session.secure_cookies = true;
        config.api.max_page_size = 100;
        config.api.enable_request_logging = false;
        config.security.permissive_cors = false;
        config.security.cors_origins = vec!["https://expert-match.app".to_string()];
        config
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.session.secure_cookies);
        assert!(config.security.permissive_cors);
        assert_eq!(config.session.access_cookie, "sb-access-token");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.session.secure_cookies);
        assert!(!config.security.permissive_cors);
        assert_eq!(config.api.max_page_size, 100);
    }

    #[test]
    fn perimeter_matches_prefix_on_segment_boundary() {
        let config = AppConfig::development();
        assert!(config.server.perimeter_covers("/admin"));
        assert!(config.server.perimeter_covers("/admin/users"));
        assert!(!config.server.perimeter_covers("/administrator"));
        assert!(!config.server.perimeter_covers("/api/admin/stats"));
    }

    #[test]
    fn perimeter_ignores_trailing_slash_on_prefix() {
        let mut config = AppConfig::development();
        config.server.perimeter_admin_prefixes = split_list("/admin/, /ops");
        assert!(config.server.perimeter_covers("/admin"));
        assert!(config.server.perimeter_covers("/admin/users"));
        assert!(!config.server.perimeter_covers("/administrator"));
        assert!(config.server.perimeter_covers("/ops"));

        config.server.perimeter_admin_prefixes = split_list("/");
        assert!(config.server.perimeter_covers("/"));
        assert!(config.server.perimeter_covers("/anything/at/all"));
    }

    #[test]
    fn hosted_auth_requires_backend_url() {
        let mut config = AppConfig::development();
        config.database.url = Some("postgres://localhost/expert_match".to_string());
        assert_eq!(config.validate(), Err(ConfigError::Missing("BACKEND_URL")));

        config.backend.url = Some("https://project.backend.example".to_string());
        assert_eq!(config.validate(), Err(ConfigError::Missing("BACKEND_ANON_KEY")));

        config.backend.anon_key = Some("anon".to_string());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn local_auth_is_rejected_in_production() {
        let mut config = AppConfig::production();
        config.server.data_backend = DataBackend::Memory;
        config.server.auth_backend = AuthBackend::Local;
        config.realtime.source = RealtimeSource::InProcess;
        config.backend.jwt_secret = Some("secret".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn memory_backend_cannot_listen_to_database() {
        let mut config = AppConfig::development();
        config.server.data_backend = DataBackend::Memory;
        config.server.auth_backend = AuthBackend::Local;
        config.backend.jwt_secret = Some("secret".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.realtime.source = RealtimeSource::InProcess;
        assert_eq!(config.validate(), Ok(()));
    }
}
