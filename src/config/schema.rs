//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The page renderer that pass-through requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Session and profile provider settings.
    pub auth: AuthConfig,

    /// Route classification and redirect targets.
    pub routes: RoutesConfig,

    /// Paths that bypass the gate entirely.
    pub exclusions: ExclusionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream page renderer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Renderer address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Auth/database provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the provider project (e.g., "https://xyz.supabase.co").
    pub url: String,

    /// Public anon key sent as `apikey` on every provider call.
    pub anon_key: String,

    /// Cookie carrying the access token.
    pub access_cookie: String,

    /// Cookie carrying the refresh token.
    pub refresh_cookie: String,

    /// Table holding user profiles.
    pub profile_table: String,

    /// Column holding the display name used for completeness.
    pub display_name_column: String,

    /// Per-call timeout for provider requests in milliseconds.
    pub timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".to_string(),
            anon_key: String::new(),
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            profile_table: "profiles".to_string(),
            display_name_column: "full_name".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Route classification table and redirect targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path prefixes of the login/registration pages.
    pub auth_prefixes: Vec<String>,

    /// Exact path of the onboarding page.
    pub onboarding_path: String,

    /// Path prefixes that require a signed-in user with a complete profile.
    pub protected_prefixes: Vec<String>,

    /// Redirect target for anonymous or expired sessions.
    pub login_path: String,

    /// Redirect target for signed-in users with nothing left to do.
    pub dashboard_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            auth_prefixes: vec!["/login".to_string(), "/register".to_string()],
            onboarding_path: "/onboarding".to_string(),
            protected_prefixes: [
                "/dashboard",
                "/projects",
                "/library",
                "/search",
                "/settings",
                "/profile",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            login_path: "/login".to_string(),
            dashboard_path: "/dashboard".to_string(),
        }
    }
}

/// Static assets and framework internals skipped before the gate runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Path prefixes that bypass the gate.
    pub prefixes: Vec<String>,

    /// File extensions (without the dot) that bypass the gate.
    pub extensions: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/favicon.ico".to_string(),
            ],
            extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client within one window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// How often expired entries are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Upper bound on tracked client addresses.
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 60_000,
            sweep_interval_secs: 60,
            max_tracked_clients: 100_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "portal_gate=debug,tower_http=debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Deployment mode. Production adds CSP/HSTS and `Secure` cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Deployment mode.
    pub mode: DeploymentMode,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Development,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
