//! Session and profile resolution.
//!
//! # Data Flow
//! ```text
//! Request cookies
//!     → cookies.rs (parse Cookie headers)
//!     → SessionStore::resolve (provider.rs or memory.rs)
//!     → SessionResolution { identity, error, refreshed_cookies }
//!
//! Identity (protected/onboarding routes only)
//!     → ProfileStore::fetch
//!     → Option<Profile> → completeness flag
//! ```
//!
//! # Design Decisions
//! - Stores never fail the request; errors travel inside the resolution
//! - Identity is derived per request and never cached
//! - Refreshed cookies are returned, not written, so the caller decides
//!   which response carries them

use async_trait::async_trait;

use crate::error::{ProfileError, SessionError};

pub mod cookies;
pub mod memory;
pub mod provider;

pub use cookies::{RequestCookies, SetCookie};
pub use memory::{MemoryProfileStore, MemorySessionStore};
pub use provider::{ProviderProfileStore, ProviderSessionStore};

/// The authenticated subject of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider user id.
    pub id: String,
    pub email: Option<String>,
    /// Token the identity was resolved from; profile queries run with it.
    pub access_token: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            access_token: None,
        }
    }
}

/// The part of a profile record the gate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
}

impl Profile {
    /// A profile is complete once it carries a non-blank display name.
    pub fn is_complete(&self) -> bool {
        self.display_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

/// Completeness of an optional profile record; a missing record is incomplete.
pub fn profile_complete(profile: Option<&Profile>) -> bool {
    profile.is_some_and(Profile::is_complete)
}

/// Outcome of resolving a request's cookies.
#[derive(Debug, Default)]
pub struct SessionResolution {
    pub identity: Option<Identity>,
    pub error: Option<SessionError>,
    /// Cookies to set on whatever response ends up being returned.
    pub refreshed_cookies: Vec<SetCookie>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    pub fn failed(error: SessionError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<SetCookie>) -> Self {
        self.refreshed_cookies = cookies;
        self
    }
}

/// Resolves request cookies into an identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn resolve(&self, cookies: &RequestCookies) -> SessionResolution;
}

/// Looks up the profile record of an identity.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, identity: &Identity) -> Result<Option<Profile>, ProfileError>;
}
