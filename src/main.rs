//! Portal request gate (v1)
//!
//! Runs the gate as a reverse proxy in front of the page renderer.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                     PORTAL GATE                      │
//!   Client         │  ┌──────────┐   ┌────────────┐   ┌────────────────┐  │
//!   ───────────────┼─▶│ request  │──▶│ rate limit │──▶│ session store  │──┼──▶ auth API
//!                  │  │ id/trace │   └─────┬──────┘   └───────┬────────┘  │
//!                  │  └──────────┘         │ 429              ▼           │
//!                  │                       ▼           ┌────────────────┐  │
//!                  │                    client         │ profile store  │──┼──▶ REST API
//!                  │                                   └───────┬────────┘  │
//!                  │                                           ▼           │
//!                  │                                   ┌────────────────┐  │
//!   ◀──────────────┼──── redirect + cookies + headers ◀│ decision table │  │
//!                  │                                   └───────┬────────┘  │
//!                  │                                           │ pass      │
//!                  │                                           ▼           │
//!   ◀──────────────┼──── response + cookies + headers ◀──── proxy ─────────┼──▶ renderer
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use portal_gate::config::loader::{default_config, load_config};
use portal_gate::config::watcher::ConfigWatcher;
use portal_gate::config::GateConfig;
use portal_gate::gate::GateState;
use portal_gate::http::GateServer;
use portal_gate::lifecycle::{signals, Shutdown};
use portal_gate::observability::{logging, metrics};
use portal_gate::session::{Identity, MemoryProfileStore, MemorySessionStore};

#[derive(Parser)]
#[command(name = "portal-gate")]
#[command(about = "Session-aware request gate for the research portal", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use built-in in-memory users instead of the hosted provider.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_tracing(&config.observability);
    tracing::info!("portal-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        mode = ?config.security.mode,
        rate_limit = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = if cli.demo {
        tracing::warn!("Demo mode: sessions and profiles are in-memory");
        GateServer::new(config.clone(), demo_gate(&config))
    } else {
        GateServer::with_provider(config.clone())?
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Access tokens `demo-complete` and `demo-incomplete`, refresh token `demo-refresh`.
fn demo_gate(config: &GateConfig) -> GateState {
    let sessions = MemorySessionStore::new(&config.auth.access_cookie, &config.auth.refresh_cookie)
        .with_secure_cookies(config.security.mode.is_production());
    let profiles = MemoryProfileStore::new();

    sessions.insert_access_token("demo-complete", Identity::new("user-complete"));
    sessions.insert_access_token("demo-incomplete", Identity::new("user-incomplete"));
    sessions.insert_refresh_token("demo-refresh", Identity::new("user-complete"));
    profiles.upsert("user-complete", Some("Demo Researcher"));
    profiles.upsert("user-incomplete", None);

    GateState::new(config, Arc::new(sessions), Arc::new(profiles))
}
