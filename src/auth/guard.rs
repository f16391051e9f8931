use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use uuid::Uuid;

use super::provider::AuthProvider;
use super::Identity;
use crate::database::ProfileStore;

pub const IDENTITY_HEADER_PREFIX: &str = "x-identity-";
pub const IDENTITY_ID_HEADER: &str = "x-identity-id";
pub const IDENTITY_EMAIL_HEADER: &str = "x-identity-email";
pub const IDENTITY_ADMIN_HEADER: &str = "x-identity-admin";

/// A caller allowed onto admin-restricted routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// What the gateway already established for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerimeterOutcome {
    Admin(AdminIdentity),
    NotAdmin,
}

/// Whether the perimeter settled the admin question before the handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerimeterDecision {
    Decided(PerimeterOutcome),
    Unresolved,
}

impl PerimeterDecision {
    /// Read the trusted identity headers. Anything incomplete or malformed is
    /// `Unresolved` so the guard falls back to a direct lookup.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let Some(id) = header(IDENTITY_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()) else {
            return PerimeterDecision::Unresolved;
        };
        let privileged = match header(IDENTITY_ADMIN_HEADER) {
            Some("true") => true,
            Some("false") => false,
            _ => return PerimeterDecision::Unresolved,
        };

        if privileged {
            let email = header(IDENTITY_EMAIL_HEADER)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            PerimeterDecision::Decided(PerimeterOutcome::Admin(AdminIdentity { id, email }))
        } else {
            PerimeterDecision::Decided(PerimeterOutcome::NotAdmin)
        }
    }
}

/// Drop every inbound `x-identity-*` header. Must run before anything reads them.
pub fn strip_trusted_headers(headers: &mut HeaderMap) -> usize {
    let forged: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IDENTITY_HEADER_PREFIX))
        .cloned()
        .collect();
    for name in &forged {
        headers.remove(name);
    }
    forged.len()
}

/// Write the trusted headers for a validated identity.
pub fn annotate(headers: &mut HeaderMap, identity: &Identity, privileged: bool) {
    if let Ok(value) = HeaderValue::from_str(&identity.id.to_string()) {
        headers.insert(IDENTITY_ID_HEADER, value);
    }
    if let Some(value) = identity
        .email
        .as_deref()
        .and_then(|email| HeaderValue::from_str(email).ok())
    {
        headers.insert(IDENTITY_EMAIL_HEADER, value);
    }
    headers.insert(
        IDENTITY_ADMIN_HEADER,
        HeaderValue::from_static(if privileged { "true" } else { "false" }),
    );
}

/// Look up the privilege flag for an identity. Missing profile or storage
/// failure reads as not privileged.
pub async fn resolve_privilege<P>(profiles: &P, user_id: Uuid) -> bool
where
    P: ProfileStore + ?Sized,
{
    match profiles.get_profile(user_id).await {
        Ok(Some(profile)) => profile.is_privileged(),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(%user_id, "Privilege lookup failed: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoCredential,
    InvalidSession,
    NotPrivileged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminDecision {
    Authorized(AdminIdentity),
    Denied(DenyReason),
}

/// Decide whether the caller may use an admin-restricted route.
///
/// A decided perimeter is final and never touches storage. Otherwise the
/// credential is validated with the auth provider and the privilege flag is
/// read from storage.
pub async fn authorize_admin<A, P>(
    decision: PerimeterDecision,
    credential: Option<&str>,
    auth: &A,
    profiles: &P,
) -> AdminDecision
where
    A: AuthProvider + ?Sized,
    P: ProfileStore + ?Sized,
{
    match decision {
        PerimeterDecision::Decided(PerimeterOutcome::Admin(admin)) => {
            AdminDecision::Authorized(admin)
        }
        PerimeterDecision::Decided(PerimeterOutcome::NotAdmin) => {
            AdminDecision::Denied(DenyReason::NotPrivileged)
        }
        PerimeterDecision::Unresolved => {
            let Some(token) = credential else {
                return AdminDecision::Denied(DenyReason::NoCredential);
            };
            let identity = match auth.get_user(token).await {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::debug!("Admin credential rejected: {}", e);
                    return AdminDecision::Denied(DenyReason::InvalidSession);
                }
            };
            if resolve_privilege(profiles, identity.id).await {
                AdminDecision::Authorized(AdminIdentity {
                    id: identity.id,
                    email: identity.email,
                })
            } else {
                AdminDecision::Denied(DenyReason::NotPrivileged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtKeys, LocalAuth};
    use crate::database::models::*;
    use crate::database::{MemoryStore, StoreError};
    use crate::types::Role;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every profile read so tests can assert the fast path skips storage.
    #[derive(Default)]
    struct CountingProfiles {
        inner: MemoryStore,
        reads: AtomicUsize,
    }

    impl CountingProfiles {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ProfileStore for CountingProfiles {
        async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
            self.hit();
            self.inner.get_profile(id).await
        }

        async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
            self.hit();
            self.inner.find_profile_by_email(email).await
        }

        async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError> {
            self.hit();
            self.inner.list_profiles(page).await
        }

        async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
            self.inner.create_profile(profile).await
        }

        async fn update_privileges(
            &self,
            id: Uuid,
            update: &PrivilegeUpdate,
        ) -> Result<Profile, StoreError> {
            self.inner.update_privileges(id, update).await
        }

        async fn get_expert_profile(
            &self,
            user_id: Uuid,
        ) -> Result<Option<ExpertProfile>, StoreError> {
            self.hit();
            self.inner.get_expert_profile(user_id).await
        }

        async fn upsert_expert_profile(
            &self,
            user_id: Uuid,
            input: &ExpertProfileInput,
        ) -> Result<ExpertProfile, StoreError> {
            self.inner.upsert_expert_profile(user_id, input).await
        }

        async fn get_organization_profile(
            &self,
            user_id: Uuid,
        ) -> Result<Option<OrganizationProfile>, StoreError> {
            self.hit();
            self.inner.get_organization_profile(user_id).await
        }

        async fn upsert_organization_profile(
            &self,
            user_id: Uuid,
            input: &OrganizationProfileInput,
        ) -> Result<OrganizationProfile, StoreError> {
            self.inner.upsert_organization_profile(user_id, input).await
        }
    }

    fn local_auth() -> LocalAuth {
        LocalAuth::new(JwtKeys::from_secret("guard-secret").unwrap(), chrono::Duration::minutes(5))
    }

    async fn signed_in(
        auth: &LocalAuth,
        profiles: &CountingProfiles,
        email: &str,
        is_admin: bool,
    ) -> (Identity, String) {
        let identity = auth.register(email, "password1").await.unwrap();
        profiles
            .inner
            .create_profile(&NewProfile {
                id: identity.id,
                email: email.to_string(),
                full_name: None,
                role: Role::Expert,
                is_admin,
            })
            .await
            .unwrap();
        let token = auth.issue_access_token(&identity).unwrap();
        (identity, token)
    }

    #[tokio::test]
    async fn trusted_privileged_headers_skip_storage() {
        let auth = local_auth();
        let profiles = CountingProfiles::default();
        let who = Identity { id: Uuid::new_v4(), email: Some("root@example.com".to_string()) };

        let mut headers = HeaderMap::new();
        annotate(&mut headers, &who, true);

        let perimeter = PerimeterDecision::from_headers(&headers);
        let decision = authorize_admin(perimeter, None, &auth, &profiles).await;
        assert_eq!(
            decision,
            AdminDecision::Authorized(AdminIdentity { id: who.id, email: who.email.clone() })
        );
        assert_eq!(profiles.reads(), 0);
    }

    #[tokio::test]
    async fn trusted_unprivileged_headers_deny_without_lookup() {
        let auth = local_auth();
        let profiles = CountingProfiles::default();
        let (who, token) = signed_in(&auth, &profiles, "admin@example.com", true).await;

        // The perimeter's answer is final even if storage would say otherwise.
        let mut headers = HeaderMap::new();
        annotate(&mut headers, &who, false);

        let perimeter = PerimeterDecision::from_headers(&headers);
        let decision = authorize_admin(perimeter, Some(&token), &auth, &profiles).await;
        assert_eq!(decision, AdminDecision::Denied(DenyReason::NotPrivileged));
        assert_eq!(profiles.reads(), 0);
    }

    #[tokio::test]
    async fn fallback_denies_valid_session_without_flag() {
        let auth = local_auth();
        let profiles = CountingProfiles::default();
        let (_, token) = signed_in(&auth, &profiles, "expert@example.com", false).await;

        let decision =
            authorize_admin(PerimeterDecision::Unresolved, Some(&token), &auth, &profiles).await;
        assert_eq!(decision, AdminDecision::Denied(DenyReason::NotPrivileged));
        assert_eq!(profiles.reads(), 1);
    }

    #[tokio::test]
    async fn fallback_authorizes_flagged_profile() {
        let auth = local_auth();
        let profiles = CountingProfiles::default();
        let (who, token) = signed_in(&auth, &profiles, "ops@example.com", true).await;

        let decision =
            authorize_admin(PerimeterDecision::Unresolved, Some(&token), &auth, &profiles).await;
        assert_eq!(
            decision,
            AdminDecision::Authorized(AdminIdentity { id: who.id, email: who.email })
        );
    }

    #[tokio::test]
    async fn missing_or_bad_credentials_are_denied() {
        let auth = local_auth();
        let profiles = CountingProfiles::default();

        assert_eq!(
            authorize_admin(PerimeterDecision::Unresolved, None, &auth, &profiles).await,
            AdminDecision::Denied(DenyReason::NoCredential)
        );
        assert_eq!(
            authorize_admin(PerimeterDecision::Unresolved, Some("garbage"), &auth, &profiles).await,
            AdminDecision::Denied(DenyReason::InvalidSession)
        );
        assert_eq!(profiles.reads(), 0);
    }

    #[test]
    fn malformed_headers_are_unresolved() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        headers.insert(IDENTITY_ADMIN_HEADER, HeaderValue::from_static("true"));
        assert_eq!(PerimeterDecision::from_headers(&headers), PerimeterDecision::Unresolved);

        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4().to_string();
        headers.insert(IDENTITY_ID_HEADER, HeaderValue::from_str(&id).unwrap());
        headers.insert(IDENTITY_ADMIN_HEADER, HeaderValue::from_static("yes"));
        assert_eq!(PerimeterDecision::from_headers(&headers), PerimeterDecision::Unresolved);
    }

    #[test]
    fn strip_removes_only_identity_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_ADMIN_HEADER, HeaderValue::from_static("true"));
        headers.insert("x-identity-anything", HeaderValue::from_static("1"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        assert_eq!(strip_trusted_headers(&mut headers), 2);
        assert_eq!(PerimeterDecision::from_headers(&headers), PerimeterDecision::Unresolved);
        assert!(headers.contains_key("x-request-id"));
    }
}
