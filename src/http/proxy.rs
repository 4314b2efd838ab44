//! Forwarding of passed-through requests to the page renderer.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{uri::Scheme, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::observability::metrics;

/// Upstream client state.
#[derive(Clone)]
pub struct UpstreamState {
    client: Client<HttpConnector, Body>,
    authority: String,
}

impl UpstreamState {
    pub fn new(address: &str) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            authority: address.to_string(),
        }
    }
}

/// Fallback handler: anything the gate let through goes to the renderer.
pub async fn forward(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = match Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(state.authority.as_str())
        .path_and_query(path_and_query)
        .build()
    {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.authority, "Cannot build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.uri = uri;

    tracing::debug!(method = %method, uri = %parts.uri, "Forwarding to renderer");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_upstream(method.as_str(), response.status().as_u16(), start);
            into_response(response)
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.authority, "Upstream error");
            metrics::record_upstream(method.as_str(), 502, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

fn into_response(response: hyper::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
