//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, limit > 0)
//! - Check paths are absolute and redirect targets cannot loop
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GateConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address",
        ));
    }
    if config.upstream.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "upstream.address",
            "must be a socket address",
        ));
    }
    if url::Url::parse(&config.auth.url).is_err() {
        errors.push(ValidationError::new("auth.url", "must be an absolute URL"));
    }
    if config.auth.access_cookie.is_empty() || config.auth.refresh_cookie.is_empty() {
        errors.push(ValidationError::new("auth", "cookie names must not be empty"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
        }
        if rl.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
        }
        if rl.sweep_interval_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.sweep_interval_secs",
                "must be > 0",
            ));
        }
        if rl.max_tracked_clients == 0 {
            errors.push(ValidationError::new(
                "rate_limit.max_tracked_clients",
                "must be > 0",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    let routes = &config.routes;
    let paths = routes
        .auth_prefixes
        .iter()
        .map(|p| ("routes.auth_prefixes", p))
        .chain(routes.protected_prefixes.iter().map(|p| ("routes.protected_prefixes", p)))
        .chain([
            ("routes.onboarding_path", &routes.onboarding_path),
            ("routes.login_path", &routes.login_path),
            ("routes.dashboard_path", &routes.dashboard_path),
        ]);
    for (field, path) in paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, format!("'{}' must start with '/'", path)));
        }
    }

    // Anonymous users are sent to the login page; if it were protected they
    // would bounce forever.
    if routes
        .protected_prefixes
        .iter()
        .any(|p| routes.login_path.starts_with(p.as_str()))
    {
        errors.push(ValidationError::new(
            "routes.login_path",
            "must not fall under a protected prefix",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GateConfig::default();
        config.rate_limit.max_requests = 0;
        config.rate_limit.window_ms = 0;
        config.routes.onboarding_path = "onboarding".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "rate_limit.window_ms"));
        assert!(errors.iter().any(|e| e.field == "routes.onboarding_path"));
    }

    #[test]
    fn test_disabled_rate_limit_skips_range_checks() {
        let mut config = GateConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_protected_login_page_rejected() {
        let mut config = GateConfig::default();
        config.routes.login_path = "/dashboard/login".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "routes.login_path");
    }
}
