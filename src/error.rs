//! Gate error taxonomy.
//!
//! Every variant is resolved locally: a rate-limit rejection becomes a bare
//! 429, everything else becomes a row of the decision table. Nothing here is
//! ever shown to the renderer or the client as a payload.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Substring that marks a session error as an expired/invalid refresh token.
pub const REFRESH_TOKEN_NOT_FOUND: &str = "refresh_token_not_found";

/// Failure while resolving cookies into an identity.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The provider answered with an error body.
    #[error("{code}: {message}")]
    Provider { code: String, message: String },
    #[error("session transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed session response: {0}")]
    Decode(String),
}

impl SessionError {
    /// True when the user has to sign in again.
    pub fn is_expired_credential(&self) -> bool {
        self.to_string().contains(REFRESH_TOKEN_NOT_FOUND)
    }
}

/// Failure while fetching a profile record.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("profile store returned {0}")]
    Status(u16),
    #[error("malformed profile response: {0}")]
    Decode(String),
}

/// Conditions the gate resolves on its own.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("rate limit exceeded for {client}")]
    RateLimitExceeded { client: String },
    #[error("session expired")]
    SessionExpired,
    #[error("session resolution failed: {0}")]
    SessionResolution(SessionError),
    #[error("profile lookup failed: {0}")]
    ProfileLookup(ProfileError),
}

impl GateError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::RateLimitExceeded { .. } => "rate_limited",
            GateError::SessionExpired => "session_expired",
            GateError::SessionResolution(_) => "session_error",
            GateError::ProfileLookup(_) => "profile_error",
        }
    }
}

impl From<SessionError> for GateError {
    fn from(err: SessionError) -> Self {
        if err.is_expired_credential() {
            GateError::SessionExpired
        } else {
            GateError::SessionResolution(err)
        }
    }
}

impl From<ProfileError> for GateError {
    fn from(err: ProfileError) -> Self {
        GateError::ProfileLookup(err)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response()
            }
            // The middleware turns these into redirects or degraded decisions;
            // reaching this arm means a caller skipped the decision table.
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
