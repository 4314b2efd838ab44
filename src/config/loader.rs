//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{DeploymentMode, GateConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the provider base URL.
pub const ENV_AUTH_URL: &str = "PORTAL_GATE_AUTH_URL";
/// Overrides the provider anon key.
pub const ENV_AUTH_ANON_KEY: &str = "PORTAL_GATE_AUTH_ANON_KEY";
/// `production` or `development`.
pub const ENV_MODE: &str = "PORTAL_GATE_MODE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse, apply environment overrides, then validate.
///
/// `env` is injected so tests do not touch the process environment.
pub fn parse_config<F>(content: &str, env: F) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: GateConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn default_config() -> Result<GateConfig, ConfigError> {
    parse_config("", |key| std::env::var(key).ok())
}

fn apply_env_overrides<F>(config: &mut GateConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env(ENV_AUTH_URL) {
        config.auth.url = url;
    }
    if let Some(key) = env(ENV_AUTH_ANON_KEY) {
        config.auth.anon_key = key;
    }
    match env(ENV_MODE).as_deref() {
        Some("production") => config.security.mode = DeploymentMode::Production,
        Some("development") => config.security.mode = DeploymentMode::Development,
        Some(other) => {
            tracing::warn!(value = %other, "Ignoring unknown {}", ENV_MODE);
        }
        None => {}
    }
}
