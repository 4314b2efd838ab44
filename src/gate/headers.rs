//! Security response headers.
//!
//! Applied to every gated response (pass-through and redirect), never to the
//! 429 rejection or to excluded asset paths.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::DeploymentMode;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval' https://cdn.jsdelivr.net; style-src 'self' 'unsafe-inline';";
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains";

const BASELINE: [(HeaderName, &str); 4] = [
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
];

/// Header set for one deployment mode.
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeaders {
    mode: DeploymentMode,
}

impl SecurityHeaders {
    pub fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    /// Overwrites any value the renderer set for the same headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in BASELINE {
            headers.insert(name, HeaderValue::from_static(value));
        }
        if self.mode.is_production() {
            headers.insert(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            );
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        SecurityHeaders::new(DeploymentMode::Development).apply(&mut headers);

        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert!(headers.get(header::CONTENT_SECURITY_POLICY).is_none());
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[test]
    fn test_production_headers() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::new(DeploymentMode::Production).apply(&mut headers);
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], CONTENT_SECURITY_POLICY);
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], STRICT_TRANSPORT_SECURITY);
        assert_eq!(headers.len(), 6);
    }
}
