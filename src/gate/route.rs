//! Route classification and gate exclusions.
//!
//! # Design Decisions
//! - Path matching is case-sensitive prefix matching, except the onboarding
//!   page which must match exactly
//! - Classification never looks at identity
//! - No regex to guarantee O(n) matching

use crate::config::{ExclusionConfig, RoutesConfig};

/// Which part of the site a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Auth,
    Onboarding,
    Protected,
    Public,
}

impl RouteClass {
    /// Only these classes need the profile store.
    pub fn requires_profile(self) -> bool {
        matches!(self, RouteClass::Protected | RouteClass::Onboarding)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::Onboarding => "onboarding",
            RouteClass::Protected => "protected",
            RouteClass::Public => "public",
        }
    }
}

/// Compiled route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    auth_prefixes: Vec<String>,
    onboarding_path: String,
    protected_prefixes: Vec<String>,
}

impl RouteTable {
    pub fn from_config(config: &RoutesConfig) -> Self {
        Self {
            auth_prefixes: config.auth_prefixes.clone(),
            onboarding_path: config.onboarding_path.clone(),
            protected_prefixes: config.protected_prefixes.clone(),
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.auth_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            RouteClass::Auth
        } else if path == self.onboarding_path {
            RouteClass::Onboarding
        } else if self
            .protected_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()))
        {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::from_config(&RoutesConfig::default())
    }
}

/// Matches static assets and framework internals that skip the gate.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    prefixes: Vec<String>,
    /// Stored with the leading dot.
    suffixes: Vec<String>,
}

impl ExclusionMatcher {
    pub fn from_config(config: &ExclusionConfig) -> Self {
        Self {
            prefixes: config.prefixes.clone(),
            suffixes: config
                .extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                .collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.suffixes.iter().any(|s| path.ends_with(s.as_str()))
    }
}

impl Default for ExclusionMatcher {
    fn default() -> Self {
        Self::from_config(&ExclusionConfig::default())
    }
}
