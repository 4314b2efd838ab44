//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use portal_gate::config::GateConfig;
use portal_gate::gate::GateState;
use portal_gate::http::GateServer;
use portal_gate::lifecycle::Shutdown;
use portal_gate::session::{Identity, MemoryProfileStore, MemorySessionStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// Seeded users:
/// - `tok-complete` → `u-complete`, display name "Ada Lovelace"
/// - `tok-incomplete` → `u-incomplete`, blank display name
/// - `tok-noprofile` → `u-none`, no profile record
/// - `tok-broken` fails with a non-expiry provider error
/// - refresh token `rt-valid` → `u-complete`
pub struct Fixture {
    pub gate: GateState,
    pub sessions: Arc<MemorySessionStore>,
    pub profiles: Arc<MemoryProfileStore>,
}

pub fn fixture(config: &GateConfig) -> Fixture {
    let sessions = Arc::new(
        MemorySessionStore::new(ACCESS_COOKIE, REFRESH_COOKIE)
            .with_secure_cookies(config.security.mode.is_production()),
    );
    let profiles = Arc::new(MemoryProfileStore::new());

    sessions.insert_access_token("tok-complete", Identity::new("u-complete"));
    sessions.insert_access_token("tok-incomplete", Identity::new("u-incomplete"));
    sessions.insert_access_token("tok-noprofile", Identity::new("u-none"));
    sessions.insert_failing_token("tok-broken", "bad_jwt");
    sessions.insert_refresh_token("rt-valid", Identity::new("u-complete"));

    profiles.upsert("u-complete", Some("Ada Lovelace"));
    profiles.upsert("u-incomplete", Some("   "));

    let gate = GateState::new(config, sessions.clone(), profiles.clone());
    Fixture {
        gate,
        sessions,
        profiles,
    }
}

/// Start a renderer stand-in that answers `200 rendered <path>` and sets a cookie of its own.
pub async fn start_renderer() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let path = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let body = format!("rendered {}", path);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nSet-Cookie: theme=dark; Path=/\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Run a gate server on an ephemeral port. Keep the `Shutdown` to stop it.
pub async fn start_gate(mut config: GateConfig, gate: GateState) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = GateServer::new(config, gate);

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown)
}

/// A client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub fn session_cookie(token: &str) -> String {
    format!("{}={}", ACCESS_COOKIE, token)
}
