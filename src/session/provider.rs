//! Stores backed by the hosted auth/database provider.
//!
//! # Responsibilities
//! - Validate access tokens against the auth API (`/auth/v1/user`)
//! - Exchange refresh tokens for a new session (`/auth/v1/token`)
//! - Query the profile table through the REST API (`/rest/v1/<table>`)
//!
//! # Design Decisions
//! - One `reqwest::Client` per store, bounded by `auth.timeout_ms`
//! - A rejected access token falls back to the refresh token before giving up
//! - An expired refresh token clears both session cookies on the way out

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::{AuthConfig, DeploymentMode};
use crate::error::{ProfileError, SessionError};
use crate::session::{
    Identity, Profile, ProfileStore, RequestCookies, SessionResolution, SessionStore, SetCookie,
};

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    user: ProviderUser,
}

/// Error bodies differ between provider versions; accept both shapes.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

impl ProviderErrorBody {
    fn into_error(self, status: StatusCode) -> SessionError {
        SessionError::Provider {
            code: self
                .error_code
                .or(self.error)
                .unwrap_or_else(|| format!("http_{}", status.as_u16())),
            message: self
                .msg
                .or(self.error_description)
                .or(self.message)
                .unwrap_or_default(),
        }
    }
}

/// Refresh cookies live as long as the provider keeps refresh tokens around.
const REFRESH_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 400;

fn build_client(timeout_ms: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Session store talking to the provider's auth API.
pub struct ProviderSessionStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_cookie: String,
    refresh_cookie: String,
    secure_cookies: bool,
}

impl ProviderSessionStore {
    pub fn new(config: &AuthConfig, mode: DeploymentMode) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            access_cookie: config.access_cookie.clone(),
            refresh_cookie: config.refresh_cookie.clone(),
            secure_cookies: mode.is_production(),
        })
    }

    /// `Ok(None)` means the token was rejected and a refresh may help.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<ProviderUser>, SessionError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "/auth/v1/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::debug!(status = %status, "Access token rejected");
            return Ok(None);
        }
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(body.into_error(status));
        }

        response
            .json::<ProviderUser>()
            .await
            .map(Some)
            .map_err(|e| SessionError::Decode(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, SessionError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(body.into_error(status));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }

    fn session_cookies(&self, tokens: &TokenResponse) -> Vec<SetCookie> {
        let mut access = SetCookie::new(
            &self.access_cookie,
            &tokens.access_token,
            self.secure_cookies,
        );
        if let Some(expires_in) = tokens.expires_in {
            access = access.with_max_age(expires_in);
        }
        let refresh = SetCookie::new(
            &self.refresh_cookie,
            &tokens.refresh_token,
            self.secure_cookies,
        )
        .with_max_age(REFRESH_COOKIE_MAX_AGE_SECS);
        vec![access, refresh]
    }

    fn clearing_cookies(&self) -> Vec<SetCookie> {
        vec![
            SetCookie::removal(&self.access_cookie, self.secure_cookies),
            SetCookie::removal(&self.refresh_cookie, self.secure_cookies),
        ]
    }
}

#[async_trait]
impl SessionStore for ProviderSessionStore {
    async fn resolve(&self, cookies: &RequestCookies) -> SessionResolution {
        if let Some(token) = cookies.get(&self.access_cookie) {
            match self.fetch_user(token).await {
                Ok(Some(user)) => {
                    return SessionResolution::authenticated(Identity {
                        id: user.id,
                        email: user.email,
                        access_token: Some(token.to_string()),
                    });
                }
                Ok(None) => {}
                Err(e) => return SessionResolution::failed(e),
            }
        }

        let Some(refresh_token) = cookies.get(&self.refresh_cookie) else {
            return SessionResolution::anonymous();
        };

        match self.refresh(refresh_token).await {
            Ok(tokens) => {
                tracing::debug!(user_id = %tokens.user.id, "Session refreshed");
                let cookies = self.session_cookies(&tokens);
                SessionResolution::authenticated(Identity {
                    id: tokens.user.id,
                    email: tokens.user.email,
                    access_token: Some(tokens.access_token),
                })
                .with_cookies(cookies)
            }
            Err(e) if e.is_expired_credential() => {
                SessionResolution::failed(e).with_cookies(self.clearing_cookies())
            }
            Err(e) => SessionResolution::failed(e),
        }
    }
}

/// Profile store reading the provider's REST API.
pub struct ProviderProfileStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    table: String,
    display_name_column: String,
}

impl ProviderProfileStore {
    pub fn new(config: &AuthConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            table: config.profile_table.clone(),
            display_name_column: config.display_name_column.clone(),
        })
    }
}

#[async_trait]
impl ProfileStore for ProviderProfileStore {
    async fn fetch(&self, identity: &Identity) -> Result<Option<Profile>, ProfileError> {
        let select = format!("id,{}", self.display_name_column);
        let id_filter = format!("eq.{}", identity.id);
        // Row-level security expects the user's own token.
        let bearer = identity.access_token.as_deref().unwrap_or(&self.anon_key);

        let response = self
            .client
            .get(endpoint(&self.base_url, &format!("/rest/v1/{}", self.table)))
            .query(&[("id", id_filter.as_str()), ("select", select.as_str()), ("limit", "1")])
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Status(status.as_u16()));
        }

        let rows: Vec<serde_json::Map<String, serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| ProfileError::Decode(e.to_string()))?;

        Ok(rows.into_iter().next().map(|row| Profile {
            id: row
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or(&identity.id)
                .to_string(),
            display_name: row
                .get(&self.display_name_column)
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }))
    }
}
