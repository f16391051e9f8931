#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{redirect::Policy, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use expert_match_api::app::{router, AppState};
use expert_match_api::auth::LocalAuth;
use expert_match_api::config::{AppConfig, AuthBackend, DataBackend, RealtimeSource};
use expert_match_api::database::models::PrivilegeUpdate;
use expert_match_api::database::{MemoryStore, ProfileStore};

pub const ACCESS_COOKIE: &str = "sb-access-token";

/// One in-process server per test, backed by the memory store and local accounts.
pub struct TestApp {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestUser {
    pub fn cookie(&self) -> String {
        format!("{}={}", ACCESS_COOKIE, self.token)
    }
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.server.port = port;
        config.server.data_backend = DataBackend::Memory;
        config.server.auth_backend = AuthBackend::Local;
        config.backend.jwt_secret = Some("integration-test-secret".to_string());
        config.realtime.source = RealtimeSource::InProcess;
        config.realtime.heartbeat_secs = 1;

        let store = Arc::new(MemoryStore::new());
        let auth = LocalAuth::from_config(&config)?;
        let state = AppState::new(config, store.clone(), Arc::new(auth));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(state)).await {
                eprintln!("test server stopped: {e}");
            }
        });

        // Redirects are part of what the tests assert on
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
        let app = Self { port, base_url, client, store };
        app.wait_ready(Duration::from_secs(10)).await?;
        Ok(app)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                let status = resp.status();
                if status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register an account with the given role and sign it in.
    pub async fn signup(&self, email: &str, role: &str) -> Result<TestUser> {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": "correct horse",
                "full_name": format!("{} user", role),
                "role": role,
            }))
            .send()
            .await?;
        anyhow::ensure!(
            resp.status() == StatusCode::CREATED,
            "register returned {}",
            resp.status()
        );

        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": "correct horse" }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "login returned {}", resp.status());
        let body: Value = resp.json().await?;

        let id = body["data"]["user"]["id"]
            .as_str()
            .context("login response missing user id")?
            .parse()?;
        let token = body["data"]["access_token"]
            .as_str()
            .context("login response missing access token")?
            .to_string();
        Ok(TestUser { id, email: email.to_string(), token })
    }

    /// Register and then flip the admin flag directly in the store.
    pub async fn signup_admin(&self, email: &str) -> Result<TestUser> {
        let user = self.signup(email, "organization").await?;
        self.store
            .update_privileges(user.id, &PrivilegeUpdate { role: None, is_admin: Some(true) })
            .await?;
        Ok(user)
    }
}
