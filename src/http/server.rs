//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: gate middleware in front of the renderer proxy
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Run background tasks (rate-limit sweeper, config updates)
//! - Serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::gate::{gate_middleware, GateState};
use crate::http::proxy::{forward, UpstreamState};
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::session::{ProviderProfileStore, ProviderSessionStore};

/// The gating reverse proxy.
pub struct GateServer {
    router: Router,
    config: GateConfig,
    gate: GateState,
}

impl GateServer {
    /// Create a server with the given gate state.
    pub fn new(config: GateConfig, gate: GateState) -> Self {
        let router = Self::build_router(&config, gate.clone());
        Self {
            router,
            config,
            gate,
        }
    }

    /// Create a server backed by the hosted auth/database provider.
    pub fn with_provider(config: GateConfig) -> Result<Self, reqwest::Error> {
        let sessions = ProviderSessionStore::new(&config.auth, config.security.mode)?;
        let profiles = ProviderProfileStore::new(&config.auth)?;
        let gate = GateState::new(&config, Arc::new(sessions), Arc::new(profiles));
        Ok(Self::new(config, gate))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, gate: GateState) -> Router {
        Router::new()
            .fallback(forward)
            .with_state(UpstreamState::new(&config.upstream.address))
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates swap the gate policy; the listener and stores
    /// keep their startup settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            mode = ?self.config.security.mode,
            "Gate server starting"
        );

        tokio::spawn(self.gate.clone().run_sweeper(shutdown.resubscribe()));

        let gate = self.gate.clone();
        let mut updates_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => gate.reload(&config),
                        None => break,
                    },
                    _ = updates_shutdown.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("Gate server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn gate(&self) -> &GateState {
        &self.gate
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
