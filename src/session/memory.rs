//! In-memory session and profile stores.
//!
//! Used by the test suites and by `portal-gate --demo`. They mirror the
//! provider's observable behaviour: unknown refresh tokens fail with
//! `refresh_token_not_found`, successful refreshes rotate both tokens.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{ProfileError, SessionError, REFRESH_TOKEN_NOT_FOUND};
use crate::session::{
    Identity, Profile, ProfileStore, RequestCookies, SessionResolution, SessionStore, SetCookie,
};

/// Token tables keyed by cookie value.
pub struct MemorySessionStore {
    access_cookie: String,
    refresh_cookie: String,
    access_tokens: DashMap<String, Identity>,
    refresh_tokens: DashMap<String, Identity>,
    failing_tokens: DashMap<String, String>,
    secure_cookies: bool,
}

impl MemorySessionStore {
    pub fn new(access_cookie: impl Into<String>, refresh_cookie: impl Into<String>) -> Self {
        Self {
            access_cookie: access_cookie.into(),
            refresh_cookie: refresh_cookie.into(),
            access_tokens: DashMap::new(),
            refresh_tokens: DashMap::new(),
            failing_tokens: DashMap::new(),
            secure_cookies: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn insert_access_token(&self, token: impl Into<String>, identity: Identity) {
        self.access_tokens.insert(token.into(), identity);
    }

    pub fn insert_refresh_token(&self, token: impl Into<String>, identity: Identity) {
        self.refresh_tokens.insert(token.into(), identity);
    }

    /// Make an access token fail resolution with the given provider error code.
    pub fn insert_failing_token(&self, token: impl Into<String>, code: impl Into<String>) {
        self.failing_tokens.insert(token.into(), code.into());
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn resolve(&self, cookies: &RequestCookies) -> SessionResolution {
        if let Some(token) = cookies.get(&self.access_cookie) {
            if let Some(code) = self.failing_tokens.get(token) {
                return SessionResolution::failed(SessionError::Provider {
                    code: code.value().clone(),
                    message: "rejected by memory store".to_string(),
                });
            }
            if let Some(identity) = self.access_tokens.get(token) {
                let mut identity = identity.value().clone();
                identity.access_token = Some(token.to_string());
                return SessionResolution::authenticated(identity);
            }
        }

        let Some(refresh_token) = cookies.get(&self.refresh_cookie) else {
            return SessionResolution::anonymous();
        };

        match self.refresh_tokens.remove(refresh_token) {
            Some((_, identity)) => {
                let access = Uuid::new_v4().to_string();
                let refresh = Uuid::new_v4().to_string();
                self.access_tokens.insert(access.clone(), identity.clone());
                self.refresh_tokens.insert(refresh.clone(), identity.clone());

                let cookies = vec![
                    SetCookie::new(&self.access_cookie, &access, self.secure_cookies),
                    SetCookie::new(&self.refresh_cookie, &refresh, self.secure_cookies),
                ];
                SessionResolution::authenticated(Identity {
                    access_token: Some(access),
                    ..identity
                })
                .with_cookies(cookies)
            }
            None => SessionResolution::failed(SessionError::Provider {
                code: REFRESH_TOKEN_NOT_FOUND.to_string(),
                message: "Invalid Refresh Token: Refresh Token Not Found".to_string(),
            })
            .with_cookies(vec![
                SetCookie::removal(&self.access_cookie, self.secure_cookies),
                SetCookie::removal(&self.refresh_cookie, self.secure_cookies),
            ]),
        }
    }
}

/// Profiles keyed by identity id.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<String, Profile>,
    unavailable: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, id: impl Into<String>, display_name: Option<&str>) {
        let id = id.into();
        self.profiles.insert(
            id.clone(),
            Profile {
                id,
                display_name: display_name.map(str::to_string),
            },
        );
    }

    /// While set, every lookup fails as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(&self, identity: &Identity) -> Result<Option<Profile>, ProfileError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProfileError::Status(503));
        }
        Ok(self.profiles.get(&identity.id).map(|p| p.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemorySessionStore {
        let store = MemorySessionStore::new("at", "rt");
        store.insert_access_token("good", Identity::new("u1"));
        store.insert_refresh_token("r1", Identity::new("u1"));
        store
    }

    #[tokio::test]
    async fn test_access_token_resolves() {
        let res = store().resolve(&RequestCookies::from([("at", "good")])).await;
        let identity = res.identity.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.access_token.as_deref(), Some("good"));
        assert!(res.refreshed_cookies.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let store = store();
        let res = store
            .resolve(&RequestCookies::from([("at", "stale"), ("rt", "r1")]))
            .await;
        assert_eq!(res.identity.unwrap().id, "u1");
        assert_eq!(res.refreshed_cookies.len(), 2);

        // The old refresh token is single use.
        let again = store.resolve(&RequestCookies::from([("rt", "r1")])).await;
        assert!(again.identity.is_none());
        assert!(again.error.unwrap().is_expired_credential());
        assert!(again.refreshed_cookies.iter().all(|c| c.max_age == Some(0)));
    }

    #[tokio::test]
    async fn test_no_cookies_is_anonymous() {
        let res = store().resolve(&RequestCookies::default()).await;
        assert!(res.identity.is_none());
        assert!(res.error.is_none());
    }

    #[tokio::test]
    async fn test_profile_store_outage() {
        let profiles = MemoryProfileStore::new();
        profiles.upsert("u1", Some("Ada"));
        let identity = Identity::new("u1");
        assert!(profiles.fetch(&identity).await.unwrap().unwrap().is_complete());

        profiles.set_unavailable(true);
        assert!(profiles.fetch(&identity).await.is_err());
    }
}
