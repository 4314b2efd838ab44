//! Cookie parsing and `Set-Cookie` rendering on top of the `cookie` crate.

use std::collections::HashMap;

use axum::http::header::InvalidHeaderValue;
use axum::http::{header, HeaderMap, HeaderValue};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};

/// Cookies sent by the client, merged across all `Cookie` headers.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    values: HashMap<String, String>,
}

impl RequestCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        let raw_headers = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|raw| raw.to_str().ok());

        for raw in raw_headers {
            // Malformed pairs are skipped, the rest of the header still counts.
            for cookie in Cookie::split_parse(raw).flatten() {
                // First occurrence wins, as browsers send the most specific path first.
                values
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value_trimmed().to_string());
            }
        }
        Self { values }
    }

    /// Non-empty value of the named cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RequestCookies {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A cookie the gate must hand back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<u64>,
    pub secure: bool,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            secure,
        }
    }

    /// A cookie that makes the browser drop `name`.
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            max_age: Some(0),
            secure,
        }
    }

    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    /// Session cookies are always `HttpOnly; SameSite=Lax; Path=/`, and `Secure` in production.
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure);
        if let Some(secs) = self.max_age {
            let secs = i64::try_from(secs).unwrap_or(i64::MAX);
            builder = builder.max_age(Duration::seconds(secs));
        }
        builder.build()
    }

    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_cookie().to_string())
    }
}
