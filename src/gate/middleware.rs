//! The gate as an axum middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::error::GateError;
use crate::gate::decision::{decide, Action, IdentityState};
use crate::gate::rate_limit::client_key;
use crate::gate::{GateContext, GateState};
use crate::observability::metrics;
use crate::session::{profile_complete, RequestCookies, SessionResolution, SetCookie};

/// Gate every request before it reaches the renderer.
pub async fn gate_middleware(
    State(state): State<GateState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let policy = state.policy();
    let path = request.uri().path().to_string();

    if policy.exclusions.matches(&path) {
        return next.run(request).await;
    }

    // 1. Rate limit, before anything touches the stores.
    if policy.rate_limit.enabled {
        let client = client_key(request.headers());
        if !state.limiter().check(&client, &policy.rate_limit) {
            let err = GateError::RateLimitExceeded { client };
            tracing::warn!(error = %err, path = %path, "Rejecting request");
            metrics::record_rate_limited();
            return err.into_response();
        }
    }

    // 2. Resolve identity.
    let route = policy.routes.classify(&path);
    let cookies = RequestCookies::from_headers(request.headers());
    let SessionResolution {
        identity,
        error,
        refreshed_cookies,
    } = state.sessions().resolve(&cookies).await;

    let identity_state = match error.map(GateError::from) {
        Some(GateError::SessionExpired) => {
            tracing::info!(path = %path, "Session expired, sending to login");
            IdentityState::Expired
        }
        Some(err) => {
            tracing::debug!(error = %err, "Treating session error as anonymous");
            metrics::record_degraded(err.kind());
            if identity.is_some() {
                IdentityState::Authenticated
            } else {
                IdentityState::Anonymous
            }
        }
        None if identity.is_some() => IdentityState::Authenticated,
        None => IdentityState::Anonymous,
    };

    // 3. Profile completeness, only where the table needs it.
    let complete = match &identity {
        Some(identity)
            if identity_state == IdentityState::Authenticated && route.requires_profile() =>
        {
            match state.profiles().fetch(identity).await {
                Ok(profile) => profile_complete(profile.as_ref()),
                Err(e) => {
                    let err = GateError::from(e);
                    tracing::warn!(
                        user_id = %identity.id,
                        error = %err,
                        "Profile lookup failed, treating profile as incomplete"
                    );
                    metrics::record_degraded(err.kind());
                    false
                }
            }
        }
        _ => false,
    };

    // 4. Decide.
    let action = decide(identity_state, route, complete);
    metrics::record_decision(action.label());
    tracing::debug!(
        path = %path,
        route = route.as_str(),
        identity = ?identity_state,
        complete,
        action = action.label(),
        "Gate decision"
    );

    let mut response = match action {
        Action::PassThrough => {
            request.extensions_mut().insert(GateContext { identity, route });
            next.run(request).await
        }
        Action::Redirect(target) => {
            Redirect::temporary(&policy.redirects.location(target, &path)).into_response()
        }
    };

    // 5. The response is final: carry cookies over and harden it.
    append_cookies(response.headers_mut(), &refreshed_cookies);
    policy.headers.apply(response.headers_mut());
    metrics::record_gate_duration(start);
    response
}

fn append_cookies(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::error!(cookie = %cookie.name, error = %e, "Dropping unrepresentable cookie");
            }
        }
    }
}
